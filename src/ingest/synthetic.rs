use std::time::Instant;

use anyhow::Result;
use rand::Rng;

use super::SourceStats;
use crate::config::SourceSettings;
use crate::frame::RawFrame;

const BACKGROUND_LUMA: u8 = 96;
const SUBJECT_LUMA: u8 = 235;
const NOISE: i16 = 2;

/// Synthetic sensor: grey background with a bright square sweeping across
/// the frame, plus a little luma noise. Frames are produced in sensor
/// orientation and tagged with the configured rotation.
pub struct SyntheticSource {
    settings: SourceSettings,
    frame_count: u64,
    started: Instant,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            frame_count: 0,
            started: Instant::now(),
            connected: false,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.started = Instant::now();
        log::info!(
            "FrameSource: connected to {} (synthetic {}x{} rot={})",
            self.settings.url,
            self.settings.width,
            self.settings.height,
            self.settings.rotation_degrees
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<RawFrame> {
        if !self.connected {
            anyhow::bail!("synthetic source {} not connected", self.settings.url);
        }
        self.frame_count += 1;

        let w = self.settings.width as usize;
        let h = self.settings.height as usize;
        let y = self.luma_plane(w, h);
        let chroma = w.div_ceil(2) * h.div_ceil(2);

        Ok(RawFrame::from_i420(
            y,
            vec![128; chroma],
            vec![128; chroma],
            self.settings.width,
            self.settings.height,
            self.settings.rotation_degrees,
            self.started.elapsed(),
        ))
    }

    /// Square side is a quarter of the shorter edge; it moves four pixels
    /// per frame and wraps around horizontally.
    fn luma_plane(&self, w: usize, h: usize) -> Vec<u8> {
        let side = (w.min(h) / 4).max(1);
        let travel = w.saturating_sub(side).max(1);
        let left = (self.frame_count as usize * 4) % travel;
        let top = (h.saturating_sub(side)) / 2;

        let mut rng = rand::thread_rng();
        let mut luma = vec![BACKGROUND_LUMA; w * h];
        for (i, px) in luma.iter_mut().enumerate() {
            let (x, y) = (i % w, i / w);
            let base = if (left..left + side).contains(&x) && (top..top + side).contains(&y) {
                SUBJECT_LUMA
            } else {
                BACKGROUND_LUMA
            };
            let noise = rng.gen_range(-NOISE..=NOISE);
            *px = (base as i16 + noise).clamp(0, 255) as u8;
        }
        luma
    }

    pub fn is_healthy(&self) -> bool {
        self.connected
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.settings.url.clone(),
        }
    }
}
