//! Annotated frame output.
//!
//! A [`FrameRecorder`] sees every scored frame together with its detections and the
//! event that went to the sink. [`AnnotatedFrameWriter`] (feature: save-frames) saves
//! each one as `frame_<index>.png` with detection outlines, a red border when the
//! score is below the warning threshold and, given a font, the score, coordinates and
//! timestamp as text.

use anyhow::Result;

use crate::detect::Detection;
use crate::event::ScoreEvent;
use crate::frame::Frame;

/// Receives each scored frame after the event is assembled.
pub trait FrameRecorder: Send {
    fn name(&self) -> &'static str;

    fn record(&mut self, frame: &Frame, detections: &[Detection], event: &ScoreEvent)
        -> Result<()>;
}

#[cfg(feature = "save-frames")]
pub use writer::{annotate, AnnotatedFrameWriter};

#[cfg(feature = "save-frames")]
mod writer {
    use ab_glyph::{FontVec, PxScale};
    use anyhow::{anyhow, Context, Result};
    use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
    use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
    use imageproc::rect::Rect;
    use std::path::{Path, PathBuf};

    use super::FrameRecorder;
    use crate::config::OutputSettings;
    use crate::detect::Detection;
    use crate::event::ScoreEvent;
    use crate::frame::Frame;

    const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
    const WARNING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
    const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
    const BOX_THICKNESS: u32 = 2;
    const WARNING_BORDER: u32 = 6;
    const TEXT_HEIGHT: f32 = 18.0;

    pub struct AnnotatedFrameWriter {
        dir: PathBuf,
        font: Option<FontVec>,
        written: u64,
    }

    impl AnnotatedFrameWriter {
        pub fn new(dir: &Path, font_path: Option<&Path>) -> Result<Self> {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create frame output directory {}", dir.display()))?;
            let font = match font_path {
                Some(path) => {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("read font {}", path.display()))?;
                    Some(
                        FontVec::try_from_vec(bytes)
                            .map_err(|e| anyhow!("load font {}: {}", path.display(), e))?,
                    )
                }
                None => None,
            };
            log::info!(
                "saving annotated frames to {} (text overlay {})",
                dir.display(),
                if font.is_some() { "on" } else { "off" }
            );
            Ok(Self {
                dir: dir.to_path_buf(),
                font,
                written: 0,
            })
        }

        /// `None` when no output directory is configured.
        pub fn from_settings(settings: &OutputSettings) -> Result<Option<Self>> {
            settings
                .save_dir
                .as_deref()
                .map(|dir| Self::new(dir, settings.font_path.as_deref()))
                .transpose()
        }

        pub fn written(&self) -> u64 {
            self.written
        }

        pub fn path_for(&self, frame: &Frame) -> PathBuf {
            self.dir.join(format!("frame_{:06}.png", frame.index))
        }
    }

    impl FrameRecorder for AnnotatedFrameWriter {
        fn name(&self) -> &'static str {
            "annotated-png"
        }

        fn record(
            &mut self,
            frame: &Frame,
            detections: &[Detection],
            event: &ScoreEvent,
        ) -> Result<()> {
            let image = annotate(frame, detections, event, self.font.as_ref())?;
            let path = self.path_for(frame);
            image
                .save(&path)
                .with_context(|| format!("write {}", path.display()))?;
            self.written += 1;
            Ok(())
        }
    }

    /// Render one frame with its overlays.
    pub fn annotate(
        frame: &Frame,
        detections: &[Detection],
        event: &ScoreEvent,
        font: Option<&FontVec>,
    ) -> Result<RgbImage> {
        frame.check_layout().map_err(|e| anyhow!(e))?;
        let mut image = to_rgb(frame)?;

        for detection in detections {
            let bbox = detection.bbox.clipped(frame.width, frame.height);
            if bbox.is_degenerate() {
                continue;
            }
            outline(
                &mut image,
                bbox.x1,
                bbox.y1,
                bbox.width() as u32,
                bbox.height() as u32,
                BOX_THICKNESS,
                BOX_COLOR,
            );
            if let Some(font) = font {
                let label = format!(
                    "Class: {}, Conf: {:.2}",
                    detection.class_id, detection.confidence
                );
                let y = (bbox.y1 - TEXT_HEIGHT as i32).max(0);
                draw_text_mut(&mut image, BOX_COLOR, bbox.x1, y, scale(), font, &label);
            }
        }

        if event.below_threshold {
            let (w, h) = image.dimensions();
            outline(&mut image, 0, 0, w, h, WARNING_BORDER, WARNING_COLOR);
        }

        if let Some(font) = font {
            let mut lines = vec![(format!("Score: {:.2}", event.score), TEXT_COLOR)];
            if event.below_threshold {
                lines.push((
                    "Warning: Low Score Detected. Road needs to be fixed".to_string(),
                    WARNING_COLOR,
                ));
            }
            lines.push((format!("Latitude: {}", coordinate(event.latitude)), TEXT_COLOR));
            lines.push((format!("Longitude: {}", coordinate(event.longitude)), TEXT_COLOR));
            lines.push((format!("Timestamp: {}", event.timestamp), TEXT_COLOR));
            let margin = WARNING_BORDER as i32 + 4;
            for (i, (text, color)) in lines.iter().enumerate() {
                let y = margin + i as i32 * (TEXT_HEIGHT as i32 + 4);
                draw_text_mut(&mut image, *color, margin, y, scale(), font, text);
            }
        }

        Ok(image)
    }

    fn to_rgb(frame: &Frame) -> Result<RgbImage> {
        let (w, h) = (frame.width, frame.height);
        let pixels = frame.pixels().to_vec();
        let image = match frame.channels {
            1 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
            3 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
            4 => ImageBuffer::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
            other => return Err(anyhow!("cannot render {}-channel frame", other)),
        };
        image
            .map(|image| image.to_rgb8())
            .ok_or_else(|| anyhow!("frame {} buffer does not match its size", frame.index))
    }

    /// Hollow rectangle `thickness` pixels wide, drawn inwards.
    fn outline(image: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, thickness: u32, color: Rgb<u8>) {
        for i in 0..thickness {
            let (inner_w, inner_h) = (w.saturating_sub(2 * i), h.saturating_sub(2 * i));
            if inner_w == 0 || inner_h == 0 {
                break;
            }
            let rect = Rect::at(x + i as i32, y + i as i32).of_size(inner_w, inner_h);
            draw_hollow_rect_mut(image, rect, color);
        }
    }

    fn scale() -> PxScale {
        PxScale::from(TEXT_HEIGHT)
    }

    fn coordinate(value: Option<f64>) -> String {
        value
            .map(|v| format!("{:.6}", v))
            .unwrap_or_else(|| "unknown".to_string())
    }

}
