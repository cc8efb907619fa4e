//! Per-frame error types.
//!
//! These are the recoverable failures of one analysis cycle. The scheduler
//! logs them, drops the frame and leaves the overlay untouched.

use thiserror::Error;

/// Errors raised while turning a `RawFrame` into a `RasterImage`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// Frame has a zero width or height.
    #[error("empty frame: {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    /// A plane is too short for the declared geometry and strides.
    #[error("{plane} plane too small: need {expected} bytes, got {actual}")]
    PlaneTooSmall {
        plane: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A stride is smaller than the row it has to hold.
    #[error("{plane} plane stride invalid: {detail}")]
    InvalidStride { plane: &'static str, detail: String },

    /// Rotation is not a multiple of 90 degrees.
    #[error("unsupported rotation: {0} degrees")]
    UnsupportedRotation(u32),

    /// Width/height arithmetic overflowed.
    #[error("frame dimensions overflow: {width}x{height}")]
    Overflow { width: u32, height: u32 },
}

impl ConversionError {
    #[must_use]
    pub const fn plane_too_small(plane: &'static str, expected: usize, actual: usize) -> Self {
        Self::PlaneTooSmall {
            plane,
            expected,
            actual,
        }
    }
}

/// Errors raised by `InferenceEngine::try_detect`.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The model never loaded; the engine is a no-op.
    #[error("model unavailable")]
    ModelUnavailable,

    /// The engine hit an unrecoverable fault earlier and is disabled.
    #[error("engine disabled")]
    Disabled,

    /// The backend failed on this frame. The next frame may succeed.
    #[error("inference failed: {0:#}")]
    Backend(anyhow::Error),

    /// The backend failed in a way that disables the engine.
    #[error("engine fault: {0}")]
    Fatal(String),
}

/// Marker error a backend can return (wrapped in `anyhow`) to signal that it
/// cannot run any further frames.
#[derive(Debug, Error)]
#[error("unrecoverable backend fault: {0}")]
pub struct EngineFault(pub String);
