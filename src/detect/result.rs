use crate::geometry::Rect;

/// One detection as produced by a backend.
///
/// `rect` is in the pixel space of the raster passed to the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f32,
    pub rect: Rect,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, score: f32, rect: Rect) -> Self {
        Self {
            label: label.into(),
            score,
            rect,
        }
    }
}

/// A detection that passed `ResultFilter`. Same shape as `RawDetection`.
pub type FilteredDetection = RawDetection;
