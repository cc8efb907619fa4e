//! Source-to-display coordinate mapping.
//!
//! A `TransformMatrix` is composed in a fixed order:
//!
//! 1. mirror (horizontal flip of the upright content)
//! 2. rotation about the source center, re-anchored at the origin of the
//!    rotated extents
//! 3. uniform scale (`min` for Fit, `max` for Fill)
//! 4. centering translation (Fit only; Fill stays top-left aligned)
//!
//! The operations do not commute, so the order is part of the contract.
//! Transforms are plain values: building or applying one has no side effects.

use serde::Deserialize;

// ----------------------------------------------------------------------------
// Rect
// ----------------------------------------------------------------------------

/// Axis-aligned rectangle, origin top-left, y pointing down.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Same rectangle with `left <= right` and `top <= bottom`.
    pub fn normalized(&self) -> Self {
        Self::new(
            self.left.min(self.right),
            self.top.min(self.bottom),
            self.left.max(self.right),
            self.top.max(self.bottom),
        )
    }
}

// ----------------------------------------------------------------------------
// FitPolicy
// ----------------------------------------------------------------------------

/// Aspect-preserving scaling policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Whole source visible, letterboxed and centered.
    Fit,
    /// Display fully covered, source cropped, top-left aligned.
    #[default]
    Fill,
}

impl std::str::FromStr for FitPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fit" => Ok(FitPolicy::Fit),
            "fill" => Ok(FitPolicy::Fill),
            other => Err(anyhow::anyhow!("unknown fit policy '{}'", other)),
        }
    }
}

// ----------------------------------------------------------------------------
// TransformMatrix
// ----------------------------------------------------------------------------

/// 2D affine transform: `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformMatrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformMatrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Uniform scale about `(cx, cy)`.
    pub fn scale_about(s: f32, cx: f32, cy: f32) -> Self {
        Self::translate(-cx, -cy)
            .then(&Self::scale(s, s))
            .then(&Self::translate(cx, cy))
    }

    /// Reflection across the vertical line `x = width / 2`.
    pub fn flip_horizontal(width: f32) -> Self {
        Self {
            a: -1.0,
            tx: width,
            ..Self::IDENTITY
        }
    }

    /// Reflection across the horizontal line `y = height / 2`.
    pub fn flip_vertical(height: f32) -> Self {
        Self {
            d: -1.0,
            ty: height,
            ..Self::IDENTITY
        }
    }

    /// Clockwise quarter-turn rotation about `(cx, cy)` (y axis down).
    /// `degrees` must already be one of 0, 90, 180, 270.
    fn rotate_about(degrees: u32, cx: f32, cy: f32) -> Self {
        let (cos, sin) = match degrees {
            90 => (0.0, 1.0),
            180 => (-1.0, 0.0),
            270 => (0.0, -1.0),
            _ => (1.0, 0.0),
        };
        let rotation = Self {
            a: cos,
            b: -sin,
            c: sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        };
        Self::translate(-cx, -cy)
            .then(&rotation)
            .then(&Self::translate(cx, cy))
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Self) -> Self {
        Self {
            a: next.a * self.a + next.b * self.c,
            b: next.a * self.b + next.b * self.d,
            c: next.c * self.a + next.d * self.c,
            d: next.c * self.b + next.d * self.d,
            tx: next.a * self.tx + next.b * self.ty + next.tx,
            ty: next.c * self.tx + next.d * self.ty + next.ty,
        }
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        )
    }

    /// Map a rectangle. Quarter turns and flips keep it axis-aligned; the
    /// result is normalized so `left <= right` and `top <= bottom`.
    pub fn apply(&self, rect: &Rect) -> Rect {
        let (x0, y0) = self.map_point(rect.left, rect.top);
        let (x1, y1) = self.map_point(rect.right, rect.bottom);
        Rect::new(x0, y0, x1, y1).normalized()
    }

    /// Uniform scale factor along x (for diagnostics).
    pub fn scale_factor(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

// ----------------------------------------------------------------------------
// CoordinateMapper
// ----------------------------------------------------------------------------

/// Inputs to `build_transform`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MappingParams {
    pub source_width: u32,
    pub source_height: u32,
    pub rotation_degrees: u32,
    pub display_width: u32,
    pub display_height: u32,
    pub mirror: bool,
    pub fit: FitPolicy,
}

/// Build the source-to-display transform.
///
/// Zero-sized source or display extents, or a rotation that is not a quarter
/// turn, yield the identity transform.
pub fn build_transform(params: &MappingParams) -> TransformMatrix {
    let MappingParams {
        source_width,
        source_height,
        rotation_degrees,
        display_width,
        display_height,
        mirror,
        fit,
    } = *params;

    if source_width == 0 || source_height == 0 || display_width == 0 || display_height == 0 {
        log::debug!("zero-sized mapping geometry; using identity transform");
        return TransformMatrix::IDENTITY;
    }
    let rotation = rotation_degrees % 360;
    if rotation % 90 != 0 {
        log::warn!(
            "rotation {} is not a quarter turn; using identity transform",
            rotation_degrees
        );
        return TransformMatrix::IDENTITY;
    }

    let sw = source_width as f32;
    let sh = source_height as f32;
    let quarter = rotation == 90 || rotation == 270;
    let (rw, rh) = if quarter { (sh, sw) } else { (sw, sh) };

    let mut m = TransformMatrix::IDENTITY;

    // The flip axis is chosen in source space so that it lands on the
    // vertical midline of the rotated extents.
    if mirror {
        m = if quarter {
            TransformMatrix::flip_vertical(sh)
        } else {
            TransformMatrix::flip_horizontal(sw)
        };
    }

    m = m
        .then(&TransformMatrix::rotate_about(rotation, sw / 2.0, sh / 2.0))
        .then(&TransformMatrix::translate((rw - sw) / 2.0, (rh - sh) / 2.0));

    let dw = display_width as f32;
    let dh = display_height as f32;
    let sx = dw / rw;
    let sy = dh / rh;
    let s = match fit {
        FitPolicy::Fit => sx.min(sy),
        FitPolicy::Fill => sx.max(sy),
    };
    m = m.then(&TransformMatrix::scale(s, s));

    if fit == FitPolicy::Fit {
        m = m.then(&TransformMatrix::translate(
            (dw - rw * s) / 2.0,
            (dh - rh * s) / 2.0,
        ));
    }
    m
}

/// Map one box through a transform.
pub fn apply(transform: &TransformMatrix, rect: &Rect) -> Rect {
    transform.apply(rect)
}

/// Caches the transform for the last seen parameters and rebuilds it when
/// any of them change.
#[derive(Debug, Default)]
pub struct CoordinateMapper {
    cached: Option<(MappingParams, TransformMatrix)>,
}

impl CoordinateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform_for(&mut self, params: &MappingParams) -> TransformMatrix {
        match &self.cached {
            Some((cached_params, m)) if cached_params == params => *m,
            _ => {
                let m = build_transform(params);
                log::debug!(
                    "rebuilt transform for {}x{} rot={} -> {}x{} mirror={} fit={:?} (scale {:.3})",
                    params.source_width,
                    params.source_height,
                    params.rotation_degrees,
                    params.display_width,
                    params.display_height,
                    params.mirror,
                    params.fit,
                    m.scale_factor()
                );
                self.cached = Some((*params, m));
                m
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
