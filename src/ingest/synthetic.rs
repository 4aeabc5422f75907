//! Synthetic frame source (`stub://`) for tests and dry runs.
//!
//! Produces RGB frames of the configured size with a slowly shifting gradient so
//! consecutive frames differ. Stops after `frame_limit` frames when one is set.

use anyhow::Result;

use super::FrameSource;
use crate::config::SourceSettings;
use crate::frame::Frame;

pub struct SyntheticSource {
    settings: SourceSettings,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings) -> Self {
        log::info!(
            "SyntheticSource: {} ({}x{})",
            settings.url,
            settings.width,
            settings.height
        );
        Self {
            settings,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = self.settings.width as usize * self.settings.height as usize * 3;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.settings.url)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.settings.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(
            Frame::rgb(pixels, self.settings.width, self.settings.height)
                .with_index(self.frame_count),
        ))
    }

    fn frames_read(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(limit: Option<u64>) -> SourceSettings {
        SourceSettings {
            url: "stub://test".to_string(),
            width: 8,
            height: 4,
            frame_limit: limit,
        }
    }

    #[test]
    fn frames_have_configured_geometry_and_increasing_index() {
        let mut source = SyntheticSource::new(settings(None));
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height, first.channels), (8, 4, 3));
        assert!(first.check_layout().is_ok());
        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert_ne!(first.pixels(), second.pixels());
    }

    #[test]
    fn stops_at_frame_limit() {
        let mut source = SyntheticSource::new(settings(Some(2)));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.frames_read(), 2);
    }

    #[test]
    fn zero_sized_frames_pass_through_for_the_pipeline_to_reject() {
        let mut source = SyntheticSource::new(SourceSettings {
            width: 0,
            ..settings(Some(1))
        });
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.area(), 0);
    }
}
