//! Frame sources.
//!
//! Sources produce `RawFrame`s in the sensor's own orientation, tagged with
//! the rotation that makes them upright:
//! - synthetic scene for `stub://` URLs (tests, demos)
//! - replayed still image for file paths (feature: ingest-still)
//!
//! A real deployment feeds frames from the platform camera stack straight
//! into `Pipeline::submit`; these sources only stand in for it.

#[cfg(feature = "ingest-still")]
mod still;
mod synthetic;

use anyhow::Result;

use crate::config::SourceSettings;
use crate::frame::RawFrame;

#[cfg(feature = "ingest-still")]
pub use still::{rgb_to_i420, StillSource};
pub use synthetic::SyntheticSource;

/// Frame source selected by URL.
pub struct FrameSource {
    backend: SourceBackend,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-still")]
    Still(StillSource),
}

impl FrameSource {
    pub fn new(settings: SourceSettings) -> Result<Self> {
        if settings.url.starts_with("stub://") {
            Ok(Self {
                backend: SourceBackend::Synthetic(SyntheticSource::new(settings)),
            })
        } else {
            #[cfg(feature = "ingest-still")]
            {
                Ok(Self {
                    backend: SourceBackend::Still(StillSource::new(settings)?),
                })
            }
            #[cfg(not(feature = "ingest-still"))]
            {
                anyhow::bail!(
                    "source '{}' requires the ingest-still feature",
                    settings.url
                )
            }
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-still")]
            SourceBackend::Still(source) => source.connect(),
        }
    }

    pub fn next_frame(&mut self) -> Result<RawFrame> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-still")]
            SourceBackend::Still(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-still")]
            SourceBackend::Still(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-still")]
            SourceBackend::Still(source) => source.stats(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}
