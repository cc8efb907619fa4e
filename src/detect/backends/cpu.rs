use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::RasterImage;
use crate::geometry::Rect;

const DEFAULT_CELL: u32 = 16;
const DEFAULT_DELTA: f32 = 12.0;
/// Luma delta that maps to a score of 1.0.
const FULL_SCORE_DELTA: f32 = 64.0;

/// CPU backend for motion detection.
///
/// Splits the raster into square cells, compares each cell's mean luma
/// against the previous frame and reports one "motion" box around every
/// changed cell. Needs no model file.
pub struct MotionBackend {
    cell: u32,
    delta: f32,
    previous: Option<LumaGrid>,
}

struct LumaGrid {
    cols: u32,
    rows: u32,
    means: Vec<f32>,
}

impl MotionBackend {
    pub fn new() -> Self {
        Self {
            cell: DEFAULT_CELL,
            delta: DEFAULT_DELTA,
            previous: None,
        }
    }

    /// Cell edge in pixels (minimum 1).
    pub fn with_cell_size(mut self, cell: u32) -> Self {
        self.cell = cell.max(1);
        self
    }

    /// Minimum mean-luma change for a cell to count as moving.
    pub fn with_delta(mut self, delta: f32) -> Self {
        self.delta = delta;
        self
    }

    fn grid(&self, image: &RasterImage) -> LumaGrid {
        let cols = image.width().div_ceil(self.cell);
        let rows = image.height().div_ceil(self.cell);
        let mut sums = vec![0f32; (cols * rows) as usize];
        let mut counts = vec![0u32; (cols * rows) as usize];
        for y in 0..image.height() {
            let row = y / self.cell;
            for x in 0..image.width() {
                let idx = (row * cols + x / self.cell) as usize;
                sums[idx] += image.luma(x, y) as f32;
                counts[idx] += 1;
            }
        }
        let means = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f32 })
            .collect();
        LumaGrid { cols, rows, means }
    }
}

impl Default for MotionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for MotionBackend {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn detect(&mut self, image: &RasterImage) -> Result<Vec<RawDetection>> {
        let current = self.grid(image);
        let previous = self.previous.replace(current);
        let (Some(prev), Some(cur)) = (previous, self.previous.as_ref()) else {
            return Ok(Vec::new());
        };
        if prev.cols != cur.cols || prev.rows != cur.rows {
            return Ok(Vec::new());
        }

        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut max_delta = 0f32;
        for row in 0..cur.rows {
            for col in 0..cur.cols {
                let idx = (row * cur.cols + col) as usize;
                let delta = (cur.means[idx] - prev.means[idx]).abs();
                if delta < self.delta {
                    continue;
                }
                max_delta = max_delta.max(delta);
                bounds = Some(match bounds {
                    None => (col, row, col, row),
                    Some((c0, r0, c1, r1)) => (c0.min(col), r0.min(row), c1.max(col), r1.max(row)),
                });
            }
        }

        let Some((c0, r0, c1, r1)) = bounds else {
            return Ok(Vec::new());
        };
        let rect = Rect::new(
            (c0 * self.cell) as f32,
            (r0 * self.cell) as f32,
            ((c1 + 1) * self.cell).min(image.width()) as f32,
            ((r1 + 1) * self.cell).min(image.height()) as f32,
        );
        let score = (max_delta / FULL_SCORE_DELTA).min(1.0);
        Ok(vec![RawDetection::new("motion", score, rect)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_with_square(size: u32, square: Option<(u32, u32, u32)>) -> RasterImage {
        let mut data = vec![40u8; (size * size * 3) as usize];
        if let Some((sx, sy, edge)) = square {
            for y in sy..sy + edge {
                for x in sx..sx + edge {
                    let i = ((y * size + x) * 3) as usize;
                    data[i..i + 3].copy_from_slice(&[240, 240, 240]);
                }
            }
        }
        RasterImage::from_rgb(data, size, size).unwrap()
    }

    #[test]
    fn first_frame_reports_nothing() {
        let mut backend = MotionBackend::new();
        assert!(backend.detect(&raster_with_square(64, None)).unwrap().is_empty());
    }

    #[test]
    fn static_scene_reports_nothing() {
        let mut backend = MotionBackend::new();
        let frame = raster_with_square(64, Some((16, 16, 16)));
        backend.detect(&frame).unwrap();
        assert!(backend.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn appearing_square_is_boxed() {
        let mut backend = MotionBackend::new();
        backend.detect(&raster_with_square(64, None)).unwrap();
        let found = backend
            .detect(&raster_with_square(64, Some((32, 16, 16))))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "motion");
        assert_eq!(found[0].rect, Rect::new(32.0, 16.0, 48.0, 32.0));
        assert_eq!(found[0].score, 1.0);
    }

    #[test]
    fn finer_cells_tighten_the_box() {
        let before = raster_with_square(64, None);
        let after = raster_with_square(64, Some((34, 18, 6)));

        let mut coarse = MotionBackend::new();
        coarse.detect(&before).unwrap();
        assert_eq!(coarse.detect(&after).unwrap()[0].rect, Rect::new(32.0, 16.0, 48.0, 32.0));

        let mut fine = MotionBackend::new().with_cell_size(4);
        fine.detect(&before).unwrap();
        assert_eq!(fine.detect(&after).unwrap()[0].rect, Rect::new(32.0, 16.0, 40.0, 24.0));
    }

    #[test]
    fn raised_delta_ignores_smaller_changes() {
        let before = raster_with_square(64, None);
        let after = raster_with_square(64, Some((32, 16, 16)));

        let mut strict = MotionBackend::new().with_delta(250.0);
        strict.detect(&before).unwrap();
        assert!(strict.detect(&after).unwrap().is_empty());

        let mut lenient = MotionBackend::new().with_delta(150.0);
        lenient.detect(&before).unwrap();
        assert_eq!(lenient.detect(&after).unwrap().len(), 1);
    }
}
