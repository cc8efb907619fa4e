use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use super::SourceStats;
use crate::config::SourceSettings;
use crate::frame::RawFrame;

/// Replays one decoded image as a stream of identical frames.
pub struct StillSource {
    settings: SourceSettings,
    width: u32,
    height: u32,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
    frame_count: u64,
    started: Instant,
}

impl StillSource {
    pub fn new(settings: SourceSettings) -> Result<Self> {
        let path = Path::new(&settings.url);
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let (y, u, v) = rgb_to_i420(image.as_raw(), width, height);
        Ok(Self {
            settings,
            width,
            height,
            y,
            u,
            v,
            frame_count: 0,
            started: Instant::now(),
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        self.started = Instant::now();
        log::info!(
            "FrameSource: replaying {} ({}x{} rot={})",
            self.settings.url,
            self.width,
            self.height,
            self.settings.rotation_degrees
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<RawFrame> {
        self.frame_count += 1;
        Ok(RawFrame::from_i420(
            self.y.clone(),
            self.u.clone(),
            self.v.clone(),
            self.width,
            self.height,
            self.settings.rotation_degrees,
            self.started.elapsed(),
        ))
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.settings.url.clone(),
        }
    }
}

/// Encode packed RGB as tightly packed I420 (BT.601 full range). Chroma is
/// averaged over each 2x2 block.
pub fn rgb_to_i420(rgb: &[u8], width: u32, height: u32) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    let mut y = vec![0u8; w * h];
    let mut u = vec![128u8; cw * ch];
    let mut v = vec![128u8; cw * ch];

    let px = |x: usize, row: usize| -> (f32, f32, f32) {
        let o = (row * w + x) * 3;
        (rgb[o] as f32, rgb[o + 1] as f32, rgb[o + 2] as f32)
    };

    for row in 0..h {
        for x in 0..w {
            let (r, g, b) = px(x, row);
            y[row * w + x] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        }
    }
    for cy in 0..ch {
        for cx in 0..cw {
            let (mut cb, mut cr, mut n) = (0.0f32, 0.0f32, 0.0f32);
            for row in (cy * 2)..(cy * 2 + 2).min(h) {
                for x in (cx * 2)..(cx * 2 + 2).min(w) {
                    let (r, g, b) = px(x, row);
                    cb += -0.168_736 * r - 0.331_264 * g + 0.5 * b;
                    cr += 0.5 * r - 0.418_688 * g - 0.081_312 * b;
                    n += 1.0;
                }
            }
            u[cy * cw + cx] = (cb / n + 128.0).round().clamp(0.0, 255.0) as u8;
            v[cy * cw + cx] = (cr / n + 128.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    (y, u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn encoded_colors_survive_conversion() {
        let rgb = [200u8, 30, 30].repeat(16);
        let (y, u, v) = rgb_to_i420(&rgb, 4, 4);
        let frame = RawFrame::from_i420(y, u, v, 4, 4, 0, std::time::Duration::ZERO);
        let raster = crate::convert::convert(&frame).unwrap();
        let [r, g, b] = raster.pixel(1, 1);
        assert!((r as i16 - 200).abs() <= 2);
        assert!((g as i16 - 30).abs() <= 2);
        assert!((b as i16 - 30).abs() <= 2);
    }

    #[test]
    fn replays_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.png");
        image::RgbImage::from_pixel(6, 4, image::Rgb([0, 0, 255]))
            .save(&path)
            .unwrap();

        let settings = SourceSettings {
            url: path.to_string_lossy().into_owned(),
            rotation_degrees: 0,
            ..PipelineConfig::default().source
        };
        let mut source = StillSource::new(settings).unwrap();
        source.connect().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(source.stats().frames_captured, 1);
    }
}
