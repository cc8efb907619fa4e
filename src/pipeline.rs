//! Live frame-analysis pipeline.
//!
//! Responsibilities:
//! - own the `FrameScheduler` and its single analysis worker
//! - load the model on the worker and report lifecycle through `StateCell`
//! - run convert -> detect -> filter -> map -> publish once per accepted frame
//! - hold the host-supplied camera binding, view geometry and zoom
//!
//! Frame rotation (sensor to upright) is consumed by the converter. View
//! rotation (upright raster to display surface) is consumed by the mapper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::convert::convert;
use crate::detect::{EngineOptions, InferenceEngine, ModelRegistry};
use crate::error::DetectError;
use crate::filter::ResultFilter;
use crate::frame::RawFrame;
use crate::geometry::{CoordinateMapper, FitPolicy, MappingParams};
use crate::lens::{select_lens, LensId, LensInfo, ZoomController};
use crate::overlay::{ColorClass, DisplayBox, OverlaySnapshot, OverlayState};
use crate::scheduler::{CycleOutcome, FrameProcessor, FrameScheduler, SchedulerStats, SubmitOutcome};
use crate::state::{PipelineState, StateCell};

/// Display surface geometry relative to the upright raster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewGeometry {
    pub display_width: u32,
    pub display_height: u32,
    pub rotation_degrees: u32,
    pub mirror: bool,
    pub fit: FitPolicy,
}

impl Default for ViewGeometry {
    fn default() -> Self {
        Self {
            display_width: 1080,
            display_height: 1920,
            rotation_degrees: 0,
            mirror: false,
            fit: FitPolicy::Fill,
        }
    }
}

/// Host-supplied inputs read by the worker at the start of each cycle.
#[derive(Debug)]
struct Binding {
    lens: Option<LensId>,
    view: ViewGeometry,
    /// Full-size view remembered while in reduced mode.
    full_view: Option<ViewGeometry>,
    zoom: ZoomController,
    /// Bumped whenever `view` changes.
    generation: u64,
}

impl Binding {
    fn set_view(&mut self, view: ViewGeometry) {
        if self.view != view {
            self.view = view;
            self.generation += 1;
        }
    }
}

type SharedBinding = Arc<Mutex<Binding>>;

fn lock(binding: &SharedBinding) -> MutexGuard<'_, Binding> {
    match binding.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct Pipeline {
    scheduler: Option<FrameScheduler>,
    binding: SharedBinding,
    /// Mirrors `binding.lens.is_some()` for the frame-delivery path.
    lens_bound: AtomicBool,
    overlay: Arc<OverlayState>,
    state: Arc<StateCell>,
    model_name: String,
}

impl Pipeline {
    /// Start the analysis worker. The model named in `config` is loaded on
    /// the worker; the pipeline reports `Uninitialized` until that finishes.
    pub fn start(config: &PipelineConfig, registry: Arc<ModelRegistry>) -> Result<Self> {
        let overlay = Arc::new(OverlayState::new());
        let state = Arc::new(StateCell::new());
        let binding = Arc::new(Mutex::new(Binding {
            lens: None,
            view: config.view_geometry(),
            full_view: None,
            zoom: config.zoom_controller(),
            generation: 0,
        }));

        let model_name = config.model.name.clone();
        let options = config.engine_options();
        let filter = config.result_filter();

        let scheduler = {
            let overlay = overlay.clone();
            let state = state.clone();
            let binding = binding.clone();
            let model_name = model_name.clone();
            FrameScheduler::spawn("lookout-analysis", move || {
                AnalysisCycle::new(
                    &registry, &model_name, options, filter, state, binding, overlay,
                )
            })?
        };

        log::info!(
            "pipeline started: model={} view={:?}",
            model_name,
            config.view_geometry()
        );

        Ok(Self {
            scheduler: Some(scheduler),
            binding,
            lens_bound: AtomicBool::new(false),
            overlay,
            state,
            model_name,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    // ------------------------------------------------------------------
    // Camera binding
    // ------------------------------------------------------------------

    /// Select and bind a rear lens. Returns false (and leaves the pipeline
    /// inert) when no rear lens is available.
    pub fn bind_camera(&self, lenses: &[LensInfo]) -> bool {
        let selected = select_lens(lenses);
        let bound = selected.is_some();
        match &selected {
            Some(id) => log::info!("camera bound to lens {}", id),
            None => log::warn!(
                "camera binding failed: no rear lens among {} reported",
                lenses.len()
            ),
        }
        let mut binding = lock(&self.binding);
        binding.lens = selected;
        self.lens_bound.store(bound, Ordering::Release);
        bound
    }

    pub fn unbind_camera(&self) {
        let mut binding = lock(&self.binding);
        self.lens_bound.store(false, Ordering::Release);
        if binding.lens.take().is_some() {
            log::info!("camera unbound");
        }
    }

    pub fn bound_lens(&self) -> Option<LensId> {
        lock(&self.binding).lens.clone()
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Offer a frame to the analysis worker. Never blocks.
    pub fn submit(&self, frame: RawFrame) -> SubmitOutcome {
        let Some(scheduler) = self.scheduler.as_ref() else {
            return SubmitOutcome::Closed;
        };
        if !self.lens_bound.load(Ordering::Acquire) {
            log::trace!("no camera bound; frame released");
            return SubmitOutcome::Inert;
        }
        scheduler.submit(frame)
    }

    /// True while a cycle runs or the model is still loading.
    pub fn is_busy(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| s.is_busy())
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // View geometry
    // ------------------------------------------------------------------

    /// Replace the display geometry. While in reduced mode this updates the
    /// remembered full view; the reduced extents stay in effect.
    pub fn set_view(&self, view: ViewGeometry) {
        let mut binding = lock(&self.binding);
        if binding.full_view.is_some() {
            binding.full_view = Some(view);
            let current = binding.view;
            binding.set_view(ViewGeometry {
                display_width: current.display_width,
                display_height: current.display_height,
                ..view
            });
        } else {
            binding.set_view(view);
        }
    }

    pub fn view(&self) -> ViewGeometry {
        lock(&self.binding).view
    }

    /// Switch to a reduced display surface of `width` x `height`.
    pub fn enter_reduced_mode(&self, width: u32, height: u32) {
        let mut binding = lock(&self.binding);
        let full = binding.full_view.unwrap_or(binding.view);
        binding.full_view = Some(full);
        binding.set_view(ViewGeometry {
            display_width: width,
            display_height: height,
            ..full
        });
        log::info!("reduced display mode {}x{}", width, height);
    }

    pub fn exit_reduced_mode(&self) {
        let mut binding = lock(&self.binding);
        if let Some(full) = binding.full_view.take() {
            binding.set_view(full);
            log::info!(
                "full display mode {}x{}",
                full.display_width,
                full.display_height
            );
        }
    }

    pub fn is_reduced(&self) -> bool {
        lock(&self.binding).full_view.is_some()
    }

    // ------------------------------------------------------------------
    // Zoom
    // ------------------------------------------------------------------

    pub fn set_zoom(&self, ratio: f32) -> f32 {
        lock(&self.binding).zoom.set_zoom(ratio)
    }

    pub fn apply_wide_angle_preview(&self) {
        lock(&self.binding).zoom.apply_wide_angle_preview();
    }

    pub fn reset_preview_scale(&self) {
        lock(&self.binding).zoom.reset_preview_scale();
    }

    pub fn zoom(&self) -> ZoomController {
        lock(&self.binding).zoom.clone()
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    pub fn overlay(&self) -> Arc<OverlayState> {
        self.overlay.clone()
    }

    /// Latest published boxes.
    pub fn current(&self) -> Arc<OverlaySnapshot> {
        self.overlay.current()
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Receive lifecycle transitions. The current state arrives first.
    pub fn subscribe_state(&self) -> Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Block until the model has either loaded or failed, or `timeout`
    /// passes. Returns the state at that point.
    pub fn wait_for_model(&self, timeout: Duration) -> PipelineState {
        let current = self.state.get();
        if current != PipelineState::Uninitialized {
            return current;
        }
        let rx = self.state.subscribe();
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(PipelineState::Uninitialized) => continue,
                Ok(state) => return state,
                Err(_) => return self.state.get(),
            }
        }
    }

    /// Stop publishing, let the in-flight cycle finish, join the worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.overlay.close();
        match self.scheduler.take() {
            Some(scheduler) => {
                let stats = scheduler.stats();
                scheduler.shutdown()?;
                log::info!(
                    "pipeline stopped: submitted={} accepted={} dropped={} published={}",
                    stats.submitted,
                    stats.accepted,
                    stats.dropped,
                    stats.published
                );
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.overlay.close();
    }
}

// ----------------------------------------------------------------------------
// Analysis cycle (worker side)
// ----------------------------------------------------------------------------

struct AnalysisCycle {
    engine: InferenceEngine,
    filter: ResultFilter,
    mapper: CoordinateMapper,
    mapped_generation: u64,
    binding: SharedBinding,
    overlay: Arc<OverlayState>,
}

impl AnalysisCycle {
    fn new(
        registry: &ModelRegistry,
        model_name: &str,
        options: EngineOptions,
        filter: ResultFilter,
        state: Arc<StateCell>,
        binding: SharedBinding,
        overlay: Arc<OverlayState>,
    ) -> Self {
        let engine = InferenceEngine::load(registry, model_name, options, state);
        Self {
            engine,
            filter,
            mapper: CoordinateMapper::new(),
            mapped_generation: 0,
            binding,
            overlay,
        }
    }

    fn run(&mut self, frame: RawFrame) -> CycleOutcome {
        let raster = match convert(&frame) {
            Ok(raster) => raster,
            Err(err) => {
                log::warn!("dropping frame ts={:?}: {}", frame.timestamp, err);
                return CycleOutcome::Skipped(err.to_string());
            }
        };
        // Hand the sensor buffer back before inference.
        drop(frame);

        let detections = match self.engine.try_detect(&raster) {
            Ok(detections) => detections,
            Err(err @ (DetectError::ModelUnavailable | DetectError::Disabled)) => {
                return CycleOutcome::Skipped(err.to_string());
            }
            Err(err) => {
                log::warn!("inference skipped: {}", err);
                return CycleOutcome::Skipped(err.to_string());
            }
        };
        let filtered = self.filter.filter(detections);

        let (view, zoom, generation, bound) = {
            let binding = lock(&self.binding);
            (
                binding.view,
                binding.zoom.clone(),
                binding.generation,
                binding.lens.is_some(),
            )
        };
        if !bound {
            return CycleOutcome::Skipped("camera unbound".to_string());
        }
        if view.display_width == 0 || view.display_height == 0 {
            log::warn!(
                "display extents {}x{} are empty; frame dropped",
                view.display_width,
                view.display_height
            );
            return CycleOutcome::Skipped("empty display".to_string());
        }
        if generation != self.mapped_generation {
            self.mapper.invalidate();
            self.mapped_generation = generation;
        }

        let params = MappingParams {
            source_width: raster.width(),
            source_height: raster.height(),
            rotation_degrees: view.rotation_degrees,
            display_width: view.display_width,
            display_height: view.display_height,
            mirror: view.mirror,
            fit: view.fit,
        };
        let transform = self
            .mapper
            .transform_for(&params)
            .then(&zoom.display_transform(view.display_width, view.display_height));

        let boxes = filtered
            .into_iter()
            .map(|d| DisplayBox {
                rect: transform.apply(&d.rect),
                color_class: if self.filter.is_primary(&d.label) {
                    ColorClass::PrimarySubject
                } else {
                    ColorClass::Other
                },
                label: d.label,
                score: d.score,
            })
            .collect();

        match self.overlay.publish(boxes) {
            Some(generation) => CycleOutcome::Published(generation),
            None => CycleOutcome::Skipped("pipeline shut down".to_string()),
        }
    }
}

impl FrameProcessor for AnalysisCycle {
    fn process(&mut self, frame: RawFrame) -> CycleOutcome {
        self.run(frame)
    }
}
