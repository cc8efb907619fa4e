//! Frame containers.
//!
//! - `RawFrame`: one planar YUV sensor frame plus capture metadata. Owned by the
//!   pipeline for exactly one cycle, then released back to its source.
//! - `RasterImage`: interleaved RGB raster derived from a `RawFrame`.
//!
//! A `RawFrame` is released when it is dropped, whether it was processed or
//! dropped by backpressure. Sources that recycle buffers register a release hook.

use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, Result};

// ----------------------------------------------------------------------------
// Plane
// ----------------------------------------------------------------------------

/// One image plane with its memory layout.
///
/// `row_stride` is the byte distance between rows, `pixel_stride` the byte
/// distance between horizontally adjacent samples (1 for planar, 2 for
/// interleaved semi-planar chroma).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Tightly packed plane (`pixel_stride` 1, `row_stride` == width).
    pub fn packed(data: Vec<u8>, width: usize) -> Self {
        Self::new(data, width, 1)
    }
}

// ----------------------------------------------------------------------------
// RawFrame
// ----------------------------------------------------------------------------

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Raw sensor frame in a 4:2:0 chroma-subsampled layout.
///
/// Deliberately not `Clone`: a frame is in flight at most once.
pub struct RawFrame {
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation that makes the frame upright.
    pub rotation_degrees: u32,
    /// Sensor timestamp as reported by the source.
    pub timestamp: Duration,

    release: Option<ReleaseHook>,
}

impl RawFrame {
    pub fn new(
        y: Plane,
        u: Plane,
        v: Plane,
        width: u32,
        height: u32,
        rotation_degrees: u32,
        timestamp: Duration,
    ) -> Self {
        Self {
            y,
            u,
            v,
            width,
            height,
            rotation_degrees,
            timestamp,
            release: None,
        }
    }

    /// Tightly packed I420 frame: full-size Y followed by quarter-size U and V.
    pub fn from_i420(
        y: Vec<u8>,
        u: Vec<u8>,
        v: Vec<u8>,
        width: u32,
        height: u32,
        rotation_degrees: u32,
        timestamp: Duration,
    ) -> Self {
        let chroma_width = (width as usize).div_ceil(2);
        Self::new(
            Plane::packed(y, width as usize),
            Plane::packed(u, chroma_width),
            Plane::packed(v, chroma_width),
            width,
            height,
            rotation_degrees,
            timestamp,
        )
    }

    /// Register a hook that runs once when the pipeline lets go of the frame.
    pub fn with_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(hook));
        self
    }

    /// Upright extents after `rotation_degrees` is applied.
    pub fn upright_extents(&self) -> (u32, u32) {
        match self.rotation_degrees % 360 {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

// ----------------------------------------------------------------------------
// RasterImage
// ----------------------------------------------------------------------------

/// Interleaved RGB raster, 3 bytes per pixel, rows tightly packed.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl RasterImage {
    /// Wrap an RGB buffer, validating its length.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("raster dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Caller guarantees `data.len() == width * height * 3`.
    pub(crate) fn from_parts(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// RGB triple at (x, y). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// BT.601 luma at (x, y).
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let [r, g, b] = self.pixel(x, y);
        let l = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        l.round().clamp(0.0, 255.0) as u8
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn gray_frame(width: u32, height: u32, rotation: u32) -> RawFrame {
        let cw = width.div_ceil(2) as usize;
        let ch = height.div_ceil(2) as usize;
        RawFrame::from_i420(
            vec![128; (width * height) as usize],
            vec![128; cw * ch],
            vec![128; cw * ch],
            width,
            height,
            rotation,
            Duration::ZERO,
        )
    }

    #[test]
    fn release_hook_runs_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let frame = gray_frame(4, 4, 0).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(frame);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn upright_extents_swap_for_quarter_turns() {
        assert_eq!(gray_frame(640, 480, 0).upright_extents(), (640, 480));
        assert_eq!(gray_frame(640, 480, 90).upright_extents(), (480, 640));
        assert_eq!(gray_frame(640, 480, 180).upright_extents(), (640, 480));
        assert_eq!(gray_frame(640, 480, 270).upright_extents(), (480, 640));
        assert_eq!(gray_frame(640, 480, 360).upright_extents(), (640, 480));
    }

    #[test]
    fn raster_validates_length() {
        assert!(RasterImage::from_rgb(vec![0; 12], 2, 2).is_ok());
        assert!(RasterImage::from_rgb(vec![0; 11], 2, 2).is_err());
    }
}
