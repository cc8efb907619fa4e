#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::RasterImage;
use crate::geometry::Rect;

/// Tract-based backend for SSD-style ONNX detectors.
///
/// Expects a model taking a `1x3xHxW` f32 tensor in `[0, 1]` and producing
/// three outputs: boxes `1xNx4` (normalized `ymin, xmin, ymax, xmax`),
/// class ids `1xN` and scores `1xN`. The raster is resized to the model
/// input with nearest-neighbour sampling; boxes are reported back in the
/// raster's own pixel space.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "model input extents must be non-zero, got {}x{}",
                width,
                height
            ));
        }
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            labels: Vec::new(),
        })
    }

    /// Load class labels, one per line, indexed by class id.
    pub fn with_labels_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels from {}", path.display()))?;
        self.labels = raw.lines().map(|line| line.trim().to_string()).collect();
        Ok(self)
    }

    fn label_for(&self, class_id: f32) -> String {
        let idx = class_id.max(0.0) as usize;
        self.labels
            .get(idx)
            .filter(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("class_{}", idx))
    }

    fn build_input(&self, image: &RasterImage) -> Result<Tensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("empty raster"));
        }
        let pixels = image.as_bytes();
        let src_w = image.width() as usize;
        let src_h = image.height() as usize;
        let dst_w = self.width as usize;
        let dst_h = self.height as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, dst_h, dst_w),
            |(_, channel, y, x)| {
                let sx = (x * src_w / dst_w).min(src_w - 1);
                let sy = (y * src_h / dst_h).min(src_h - 1);
                pixels[(sy * src_w + sx) * 3 + channel] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn extract_detections(
        &self,
        outputs: TVec<TValue>,
        image: &RasterImage,
    ) -> Result<Vec<RawDetection>> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "expected boxes, classes and scores outputs, model produced {}",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("boxes tensor was not f32")?;
        let classes = outputs[1]
            .to_array_view::<f32>()
            .context("classes tensor was not f32")?;
        let scores = outputs[2]
            .to_array_view::<f32>()
            .context("scores tensor was not f32")?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let classes: Vec<f32> = classes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();
        let count = scores.len().min(classes.len()).min(boxes.len() / 4);

        let w = image.width() as f32;
        let h = image.height() as f32;
        let mut detections = Vec::with_capacity(count);
        for i in 0..count {
            let score = scores[i];
            if !score.is_finite() {
                continue;
            }
            let b = &boxes[i * 4..i * 4 + 4];
            let rect = Rect::new(
                b[1].clamp(0.0, 1.0) * w,
                b[0].clamp(0.0, 1.0) * h,
                b[3].clamp(0.0, 1.0) * w,
                b[2].clamp(0.0, 1.0) * h,
            )
            .normalized();
            detections.push(RawDetection::new(
                self.label_for(classes[i]),
                score.clamp(0.0, 1.0),
                rect,
            ));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &RasterImage) -> Result<Vec<RawDetection>> {
        let input = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs, image)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RasterImage::from_rgb(
            vec![0; self.width as usize * self.height as usize * 3],
            self.width,
            self.height,
        )?;
        self.detect(&blank).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_input_extent_is_rejected_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.onnx");
        for (w, h) in [(0, 320), (320, 0), (0, 0)] {
            let err = TractBackend::new(&missing, w, h).err().unwrap();
            assert!(err.to_string().contains("must be non-zero"), "{err:#}");
        }
    }
}
