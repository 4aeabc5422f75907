#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectThresholds, DetectorBackend};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// Expects a single `[1, 3, H, W]` float input (RGB, `0..1`) and a `[1, 4 + classes, anchors]`
/// output where the first four rows are `cx, cy, w, h` in input pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_width: u32,
    input_height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        if input_width == 0 || input_height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
        })
    }

    /// Nearest-neighbour resize into a planar RGB tensor.
    fn build_input(&self, frame: &Frame) -> Tensor {
        let pixels = frame.pixels();
        let channels = frame.channels as usize;
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let dst_w = self.input_width as usize;
        let dst_h = self.input_height as usize;

        let input = tract_ndarray::Array4::from_shape_fn((1, 3, dst_h, dst_w), |(_, c, y, x)| {
            let sx = (x * src_w / dst_w).min(src_w - 1);
            let sy = (y * src_h / dst_h).min(src_h - 1);
            // Gray frames feed the same sample to all three planes; alpha is ignored.
            let channel = if channels == 1 { 0 } else { c };
            let idx = (sy * src_w + sx) * channels + channel;
            pixels[idx] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        frame: &Frame,
        thresholds: &DetectThresholds,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;

        let rows = view.shape()[1];
        let anchors = view.shape()[2];
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, expected at least 5", rows));
        }

        let scale_x = frame.width as f32 / self.input_width as f32;
        let scale_y = frame.height as f32 / self.input_height as f32;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class_id, confidence) = (4..rows)
                .map(|row| (row - 4, view[[0, row, i]]))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !confidence.is_finite() || confidence < thresholds.confidence {
                continue;
            }

            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
                continue;
            }
            if w <= 0.0 || h <= 0.0 {
                continue;
            }

            let detection = Detection::new(
                ((cx - w / 2.0) * scale_x).round() as i32,
                ((cy - h / 2.0) * scale_y).round() as i32,
                ((cx + w / 2.0) * scale_x).round() as i32,
                ((cy + h / 2.0) * scale_y).round() as i32,
                confidence.min(1.0),
                class_id as u32,
            );
            if detection.bbox.is_degenerate() {
                continue;
            }
            candidates.push(detection);
        }

        Ok(non_max_suppression(candidates, thresholds.iou))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, thresholds: &DetectThresholds) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame, thresholds)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::rgb(
            vec![0; (self.input_width * self.input_height * 3) as usize],
            self.input_width,
            self.input_height,
        );
        self.detect(&blank, &DetectThresholds::default()).map(|_| ())
    }
}
