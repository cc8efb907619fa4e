//! Lookout
//!
//! Live camera frame-analysis core: frames stream in from the camera, get
//! converted, run through an object detector, filtered, mapped into display
//! coordinates and handed to a renderer without ever blocking capture.
//!
//! # Architecture
//!
//! The pipeline holds these properties by construction:
//!
//! 1. **Keep-only-latest**: at most one frame is in flight; frames arriving
//!    during a cycle are dropped and released, never queued.
//! 2. **Non-blocking submit**: the frame-delivery context never waits on
//!    conversion or inference.
//! 3. **Whole-snapshot overlay**: the renderer only ever sees a complete box
//!    list from a single cycle.
//! 4. **Failures stay inside**: per-frame errors skip the frame; a model that
//!    fails to load or faults is recorded as `PipelineState`, not raised.
//!
//! # Module Structure
//!
//! - `frame`, `convert`: `RawFrame` planes and YUV 4:2:0 to RGB conversion
//! - `detect`: `InferenceEngine`, `ModelRegistry` and detector backends
//! - `filter`: class-aware confidence thresholds and the display cap
//! - `geometry`: `TransformMatrix` and the source-to-display mapper
//! - `overlay`: `OverlayState` snapshot slot read by the renderer
//! - `scheduler`: single-worker `FrameScheduler` with frame dropping
//! - `lens`: rear lens selection and zoom
//! - `pipeline`: everything above wired together
//! - `config`, `ingest`: daemon configuration and stand-in frame sources

pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod filter;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod lens;
pub mod overlay;
pub mod pipeline;
pub mod scheduler;
pub mod state;

pub use config::{
    DisplaySettings, FilterSettings, ModelSettings, PipelineConfig, SourceSettings, ZoomSettings,
};
pub use convert::{convert, rotate_rgb};
pub use detect::{
    DetectorBackend, EngineOptions, FilteredDetection, InferenceEngine, ModelRegistry,
    MotionBackend, RawDetection, StubBackend, StubStep,
};
pub use error::{ConversionError, DetectError, EngineFault};
pub use filter::ResultFilter;
pub use frame::{Plane, RasterImage, RawFrame};
pub use geometry::{
    build_transform, CoordinateMapper, FitPolicy, MappingParams, Rect, TransformMatrix,
};
pub use ingest::{FrameSource, SourceStats, SyntheticSource};
pub use lens::{select_lens, LensFacing, LensId, LensInfo, ZoomController};
pub use overlay::{ColorClass, DisplayBox, OverlaySnapshot, OverlayState};
pub use pipeline::{Pipeline, ViewGeometry};
pub use scheduler::{
    CycleOutcome, FrameProcessor, FrameScheduler, SchedulerStats, SubmitOutcome,
};
pub use state::{PipelineState, StateCell};
