//! Per-frame condition score.
//!
//! `score = 1 - boxes_area / frame_area`, where `boxes_area` depends on [`AreaMode`]:
//!
//! - `Summed` (default): plain sum of every box area. Overlapping boxes count twice and
//!   boxes are not clipped to the frame, so a saturated frame can score below zero.
//!   This matches previously recorded data.
//! - `Union`: area covered by at least one box, clipped to the frame. Never exceeds the
//!   frame area.
//!
//! Negative scores are kept unless `clamp_negative` is set.

use serde::Deserialize;

use crate::detect::{BoundingBox, Detection};
use crate::error::PipelineError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaMode {
    #[default]
    Summed,
    Union,
}

impl std::str::FromStr for AreaMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summed" => Ok(Self::Summed),
            "union" => Ok(Self::Union),
            other => Err(anyhow::anyhow!(
                "unknown area mode '{}'; expected summed or union",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub area_mode: AreaMode,
    pub clamp_negative: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameScore {
    pub frame_area: u64,
    pub boxes_area: u64,
    /// Score on the 0..1 scale (may be negative in summed mode without clamping).
    pub score: f64,
}

/// Frame area, failing on a zero-area frame instead of dividing by zero later.
pub fn frame_area(width: u32, height: u32) -> Result<u64, PipelineError> {
    let area = u64::from(width) * u64::from(height);
    if area == 0 {
        return Err(PipelineError::InvalidFrame(format!(
            "zero-area frame ({}x{})",
            width, height
        )));
    }
    Ok(area)
}

/// Sum of box areas with no overlap correction.
pub fn summed_area(detections: &[Detection]) -> u64 {
    detections
        .iter()
        .fold(0u64, |acc, d| acc.saturating_add(d.area()))
}

/// Area covered by the union of all boxes, clipped to the frame.
///
/// Coordinate compression over box edges: each elementary cell of the compressed
/// grid is either fully covered or not.
pub fn union_area(width: u32, height: u32, detections: &[Detection]) -> u64 {
    let boxes: Vec<BoundingBox> = detections
        .iter()
        .map(|d| d.bbox.clipped(width, height))
        .filter(|b| !b.is_degenerate())
        .collect();
    if boxes.is_empty() {
        return 0;
    }

    let mut xs: Vec<i32> = boxes.iter().flat_map(|b| [b.x1, b.x2]).collect();
    let mut ys: Vec<i32> = boxes.iter().flat_map(|b| [b.y1, b.y2]).collect();
    xs.sort_unstable();
    xs.dedup();
    ys.sort_unstable();
    ys.dedup();

    let mut covered = 0u64;
    for xw in xs.windows(2) {
        for yw in ys.windows(2) {
            let inside = boxes
                .iter()
                .any(|b| b.x1 <= xw[0] && xw[1] <= b.x2 && b.y1 <= yw[0] && yw[1] <= b.y2);
            if inside {
                covered += (i64::from(xw[1] - xw[0]) * i64::from(yw[1] - yw[0])) as u64;
            }
        }
    }
    covered
}

/// Score one frame's detections.
pub fn score_frame(
    width: u32,
    height: u32,
    detections: &[Detection],
    policy: &ScoringPolicy,
) -> Result<FrameScore, PipelineError> {
    let frame_area = frame_area(width, height)?;
    let boxes_area = match policy.area_mode {
        AreaMode::Summed => summed_area(detections),
        AreaMode::Union => union_area(width, height, detections),
    };

    let mut score = 1.0 - boxes_area as f64 / frame_area as f64;
    if policy.clamp_negative && score < 0.0 {
        score = 0.0;
    }

    Ok(FrameScore {
        frame_area,
        boxes_area,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(x1, y1, x2, y2, 0.9, 0)
    }

    #[test]
    fn zero_area_is_invalid_frame() {
        assert!(matches!(
            frame_area(0, 480),
            Err(PipelineError::InvalidFrame(_))
        ));
        assert!(matches!(
            frame_area(640, 0),
            Err(PipelineError::InvalidFrame(_))
        ));
    }

    #[test]
    fn summed_area_double_counts_overlap() {
        let dets = [det(10, 10, 20, 20), det(15, 15, 25, 25)];
        assert_eq!(summed_area(&dets), 200);
    }

    #[test]
    fn union_area_counts_overlap_once() {
        let dets = [det(10, 10, 20, 20), det(15, 15, 25, 25)];
        assert_eq!(union_area(100, 100, &dets), 175);
    }

    #[test]
    fn union_area_clips_to_frame() {
        let dets = [det(-50, -50, 150, 150)];
        assert_eq!(union_area(100, 100, &dets), 10_000);
    }

    #[test]
    fn union_area_of_nested_boxes_is_outer_box() {
        let dets = [det(0, 0, 50, 50), det(10, 10, 20, 20)];
        assert_eq!(union_area(100, 100, &dets), 2_500);
    }

    #[test]
    fn union_mode_never_goes_negative() {
        let dets = [det(0, 0, 100, 100), det(0, 0, 100, 100)];
        let policy = ScoringPolicy {
            area_mode: AreaMode::Union,
            clamp_negative: false,
        };
        let s = score_frame(100, 100, &dets, &policy).unwrap();
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn area_mode_parses_case_insensitively() {
        assert_eq!("Union".parse::<AreaMode>().unwrap(), AreaMode::Union);
        assert!("mask".parse::<AreaMode>().is_err());
    }
}
