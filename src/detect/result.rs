use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates, `x1 < x2` and `y1 < y2` for valid boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Box area in pixels. Degenerate or inverted boxes have no area.
    pub fn area(&self) -> u64 {
        if self.is_degenerate() {
            return 0;
        }
        (self.width() * self.height()) as u64
    }

    /// Overlap area with another box.
    pub fn intersect(&self, other: &BoundingBox) -> u64 {
        let left = i64::from(self.x1.max(other.x1));
        let right = i64::from(self.x2.min(other.x2));
        let top = i64::from(self.y1.max(other.y1));
        let bottom = i64::from(self.y2.min(other.y2));
        ((right - left).max(0) * (bottom - top).max(0)) as u64
    }

    pub fn union(&self, other: &BoundingBox) -> u64 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Intersection over union. Zero when both boxes are empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union == 0 {
            return 0.0;
        }
        self.intersect(other) as f32 / union as f32
    }

    /// Restricts the box to `[0, width] x [0, height]`.
    pub fn clipped(&self, width: u32, height: u32) -> BoundingBox {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        BoundingBox {
            x1: self.x1.clamp(0, max_x),
            y1: self.y1.clamp(0, max_y),
            x2: self.x2.clamp(0, max_x),
            y2: self.y2.clamp(0, max_y),
        }
    }
}

/// One object found in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
    pub class_id: u32,
}

impl Detection {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32, class_id: u32) -> Self {
        Self {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            confidence,
            class_id,
        }
    }

    pub fn area(&self) -> u64 {
        self.bbox.area()
    }
}
