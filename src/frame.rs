//! Decoded video frames.
//!
//! - `Frame`: owned pixel buffer plus geometry, produced by a frame source.
//!
//! Pixels are row-major and channel-interleaved (`width * height * channels` bytes).
//! Frames live for exactly one pass through the pipeline and are never retained.

use std::time::{Duration, Instant};

/// Channel counts a detector can consume (gray, RGB, RGBA).
pub const SUPPORTED_CHANNELS: [u8; 3] = [1, 3, 4];

pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,
    pub channels: u8,

    /// Position in the source stream, starting at 1 for sources that count.
    pub index: u64,

    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            index: 0,
            captured_at: Instant::now(),
        }
    }

    /// Interleaved 8-bit RGB frame.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(data, width, height, 3)
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Frame area in pixels. Zero when either dimension is zero.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Checks that dimensions, channel count and buffer length agree.
    pub fn check_layout(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "frame {} has zero dimensions ({}x{})",
                self.index, self.width, self.height
            ));
        }
        if !SUPPORTED_CHANNELS.contains(&self.channels) {
            return Err(format!(
                "frame {} has unsupported channel count {}",
                self.index, self.channels
            ));
        }
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(self.channels as usize))
            .ok_or_else(|| format!("frame {} dimensions overflow", self.index))?;
        if self.data.len() != expected {
            return Err(format!(
                "frame {} expected {} bytes, received {}",
                self.index,
                expected,
                self.data.len()
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_uses_wide_arithmetic() {
        let frame = Frame::new(Vec::new(), 100_000, 100_000, 3);
        assert_eq!(frame.area(), 10_000_000_000);
    }

    #[test]
    fn layout_accepts_matching_rgb_buffer() {
        let frame = Frame::rgb(vec![0; 4 * 2 * 3], 4, 2);
        assert!(frame.check_layout().is_ok());
    }

    #[test]
    fn layout_rejects_zero_dimensions() {
        let frame = Frame::rgb(Vec::new(), 0, 480);
        let err = frame.check_layout().unwrap_err();
        assert!(err.contains("zero dimensions"));
    }

    #[test]
    fn layout_rejects_wrong_channel_count() {
        let frame = Frame::new(vec![0; 8], 2, 2, 2);
        let err = frame.check_layout().unwrap_err();
        assert!(err.contains("channel count"));
    }

    #[test]
    fn layout_rejects_short_buffer() {
        let frame = Frame::rgb(vec![0; 10], 2, 2).with_index(7);
        let err = frame.check_layout().unwrap_err();
        assert!(err.contains("frame 7 expected 12 bytes"));
    }
}
