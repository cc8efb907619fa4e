//! Object detection.
//!
//! - `DetectorBackend`: the seam a model implementation plugs into.
//! - `ModelRegistry`: named model resources and their loaders.
//! - `InferenceEngine`: owns one loaded backend and enforces engine-level
//!   result caps; records load failure and faults as `PipelineState`.

mod backend;
pub mod backends;
mod engine;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{MotionBackend, StubBackend, StubStep};
pub use engine::{EngineOptions, InferenceEngine, DEFAULT_MAX_RESULTS, DEFAULT_SCORE_THRESHOLD};
pub use registry::ModelRegistry;
pub use result::{FilteredDetection, RawDetection};
