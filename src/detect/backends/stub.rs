use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::error::EngineFault;
use crate::frame::RasterImage;

/// Scripted step for a `StubBackend` call.
#[derive(Clone, Debug)]
pub enum StubStep {
    Detections(Vec<RawDetection>),
    /// Per-frame failure.
    Fail(String),
    /// Unrecoverable fault; disables the engine.
    Fault(String),
    /// Panic inside the backend.
    Panic(String),
}

/// Stub backend for tests and demos.
///
/// Plays back scripted steps in order, then repeats `fallback` forever.
/// An optional latency simulates slow inference.
pub struct StubBackend {
    script: VecDeque<StubStep>,
    fallback: Vec<RawDetection>,
    latency: Duration,
    calls: Arc<AtomicU64>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Vec::new(),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Detections returned on every call once the script is exhausted.
    pub fn with_detections(mut self, detections: Vec<RawDetection>) -> Self {
        self.fallback = detections;
        self
    }

    pub fn with_script(mut self, steps: impl IntoIterator<Item = StubStep>) -> Self {
        self.script.extend(steps);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Shared counter of `detect` calls, for observing the backend from outside.
    pub fn call_counter(&self) -> Arc<AtomicU64> {
        self.calls.clone()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _image: &RasterImage) -> Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        match self.script.pop_front() {
            None => Ok(self.fallback.clone()),
            Some(StubStep::Detections(detections)) => Ok(detections),
            Some(StubStep::Fail(msg)) => Err(anyhow!(msg)),
            Some(StubStep::Fault(msg)) => Err(EngineFault(msg).into()),
            Some(StubStep::Panic(msg)) => panic!("{}", msg),
        }
    }
}
