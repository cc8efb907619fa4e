use crate::geometry::TransformMatrix;

/// Preview scale used to emulate a wider field of view on devices without
/// an ultra-wide lens.
pub const WIDE_ANGLE_PREVIEW_SCALE: f32 = 0.70;

/// Zoom ratio plus preview scale.
///
/// Analysis frames always carry the full field of view; zoom and preview
/// scale only change what the display shows, so boxes are scaled about the
/// display center by `display_scale()`.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoomController {
    ratio: f32,
    min_ratio: f32,
    max_ratio: f32,
    preview_scale: f32,
}

impl ZoomController {
    pub fn new(min_ratio: f32, max_ratio: f32) -> Self {
        let min_ratio = if min_ratio.is_finite() && min_ratio > 0.0 {
            min_ratio
        } else {
            1.0
        };
        let max_ratio = if max_ratio.is_finite() && max_ratio >= min_ratio {
            max_ratio
        } else {
            min_ratio
        };
        Self {
            ratio: 1.0_f32.clamp(min_ratio, max_ratio),
            min_ratio,
            max_ratio,
            preview_scale: 1.0,
        }
    }

    /// Set the zoom ratio, clamped to the supported range. Non-finite input
    /// is ignored. Returns the ratio actually applied.
    pub fn set_zoom(&mut self, ratio: f32) -> f32 {
        if ratio.is_finite() {
            self.ratio = ratio.clamp(self.min_ratio, self.max_ratio);
        } else {
            log::warn!("ignoring non-finite zoom ratio");
        }
        self.ratio
    }

    pub fn zoom(&self) -> f32 {
        self.ratio
    }

    /// Shrink the preview to emulate a wide-angle lens.
    pub fn apply_wide_angle_preview(&mut self) {
        self.preview_scale = WIDE_ANGLE_PREVIEW_SCALE;
        log::debug!("preview scaled to {}", self.preview_scale);
    }

    pub fn reset_preview_scale(&mut self) {
        self.preview_scale = 1.0;
    }

    pub fn preview_scale(&self) -> f32 {
        self.preview_scale
    }

    pub fn display_scale(&self) -> f32 {
        self.ratio * self.preview_scale
    }

    /// Transform to post-compose onto the mapper output for a display of
    /// `width` x `height`.
    pub fn display_transform(&self, width: u32, height: u32) -> TransformMatrix {
        let s = self.display_scale();
        if s == 1.0 {
            return TransformMatrix::IDENTITY;
        }
        TransformMatrix::scale_about(s, width as f32 / 2.0, height as f32 / 2.0)
    }
}

impl Default for ZoomController {
    fn default() -> Self {
        Self::new(1.0, 10.0)
    }
}
