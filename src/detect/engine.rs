use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::backend::DetectorBackend;
use super::registry::ModelRegistry;
use super::result::RawDetection;
use crate::error::{DetectError, EngineFault};
use crate::frame::RasterImage;
use crate::state::{PipelineState, StateCell};

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.05;

/// Engine-level knobs, independent of the class-aware `ResultFilter`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineOptions {
    /// Top-K cap applied after sorting by score.
    pub max_results: usize,
    /// Generic score floor applied to every label.
    pub score_threshold: f32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// One loaded detection model.
///
/// Construction never fails: a load failure is recorded as
/// `PipelineState::ModelUnavailable` and every later call is a no-op.
/// A backend panic or `EngineFault` moves the state to `Disabled`, which is
/// terminal for this instance.
pub struct InferenceEngine {
    model_name: String,
    backend: Option<Box<dyn DetectorBackend>>,
    options: EngineOptions,
    state: Arc<StateCell>,
}

impl InferenceEngine {
    /// Load `model_name` from the registry.
    pub fn load(
        registry: &ModelRegistry,
        model_name: &str,
        options: EngineOptions,
        state: Arc<StateCell>,
    ) -> Self {
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| registry.load(model_name)));
        let backend = match loaded {
            Ok(Ok(backend)) => {
                log::info!(
                    "model '{}' loaded (backend={}, max_results={}, score_threshold={})",
                    model_name,
                    backend.name(),
                    options.max_results,
                    options.score_threshold
                );
                state.transition(PipelineState::Ready);
                Some(backend)
            }
            Ok(Err(err)) => {
                log::error!("model '{}' failed to load: {:#}; detection disabled", model_name, err);
                state.transition(PipelineState::ModelUnavailable);
                None
            }
            Err(_) => {
                log::error!("model '{}' loader panicked; detection disabled", model_name);
                state.transition(PipelineState::ModelUnavailable);
                None
            }
        };
        Self {
            model_name: model_name.to_string(),
            backend,
            options,
            state,
        }
    }

    /// Wrap an already constructed backend.
    pub fn from_backend(
        backend: Box<dyn DetectorBackend>,
        options: EngineOptions,
        state: Arc<StateCell>,
    ) -> Self {
        state.transition(PipelineState::Ready);
        Self {
            model_name: backend.name().to_string(),
            backend: Some(backend),
            options,
            state,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some() && self.state.get() == PipelineState::Ready
    }

    /// Run detection, telling per-frame failures apart from "nothing found".
    pub fn try_detect(&mut self, image: &RasterImage) -> Result<Vec<RawDetection>, DetectError> {
        match self.state.get() {
            PipelineState::Disabled => return Err(DetectError::Disabled),
            PipelineState::Ready => {}
            _ => return Err(DetectError::ModelUnavailable),
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err(DetectError::ModelUnavailable);
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.detect(image)));
        match outcome {
            Ok(Ok(detections)) => Ok(self.rank(detections)),
            Ok(Err(err)) => {
                if let Some(fault) = err.downcast_ref::<EngineFault>() {
                    let reason = fault.0.clone();
                    self.disable(&reason);
                    Err(DetectError::Fatal(reason))
                } else {
                    Err(DetectError::Backend(err))
                }
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                self.disable(&reason);
                Err(DetectError::Fatal(reason))
            }
        }
    }

    /// Run detection. Any failure yields an empty list.
    pub fn detect(&mut self, image: &RasterImage) -> Vec<RawDetection> {
        match self.try_detect(image) {
            Ok(detections) => detections,
            Err(DetectError::ModelUnavailable) | Err(DetectError::Disabled) => Vec::new(),
            Err(err) => {
                log::warn!("detect on '{}' failed: {}", self.model_name, err);
                Vec::new()
            }
        }
    }

    fn rank(&self, mut detections: Vec<RawDetection>) -> Vec<RawDetection> {
        detections.retain(|d| d.score.is_finite() && d.score >= self.options.score_threshold);
        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.options.max_results);
        detections
    }

    fn disable(&mut self, reason: &str) {
        log::error!(
            "model '{}' hit an unrecoverable fault ({}); engine disabled",
            self.model_name,
            reason
        );
        self.backend = None;
        self.state.transition(PipelineState::Disabled);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("backend panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("backend panicked: {}", msg)
    } else {
        "backend panicked".to_string()
    }
}
