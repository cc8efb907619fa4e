use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::RasterImage;

/// Detector backend trait.
///
/// `detect` is only ever called from the single analysis worker, never
/// concurrently with itself. It may block for the whole inference.
///
/// A backend that can no longer run any frame returns an error wrapping
/// `crate::error::EngineFault`; every other error is treated as a
/// per-frame failure.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on an upright RGB raster.
    fn detect(&mut self, image: &RasterImage) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
