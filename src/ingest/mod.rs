//! Frame sources.
//!
//! This module provides different sources of decoded frames:
//! - Synthetic source (`stub://<name>`, testing and dry runs)
//! - Directory of still images (feature: ingest-image)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Camera drivers are not handled here. A capture device is expected to record to a
//! file or a directory the daemon reads from.
//!
//! Sources return `Ok(None)` at end of stream. A frame that cannot be decoded is
//! reported as [`PipelineError::InvalidFrame`](crate::error::PipelineError) and the
//! source moves on to the next one. Any other read error ends the run.

#[cfg(feature = "ingest-image")]
pub mod images;
pub mod synthetic;
#[cfg(feature = "ingest-file-ffmpeg")]
pub mod video;

use anyhow::{anyhow, Result};
use std::path::Path;

#[cfg(feature = "ingest-image")]
pub use images::ImageDirSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-file-ffmpeg")]
pub use video::VideoFileSource;

use crate::config::SourceSettings;
use crate::frame::Frame;

pub trait FrameSource {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Next decoded frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Number of frames handed out so far.
    fn frames_read(&self) -> u64;
}

/// Pick a source from the configured location.
///
/// `stub://` selects the synthetic source, a directory selects the image source and any
/// other local path is decoded as a video file.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let location = settings.url.trim();
    if location.is_empty() {
        return Err(anyhow!("frame source location is empty"));
    }
    if location.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(settings.clone())));
    }
    if location.contains("://") {
        return Err(anyhow!(
            "frame source '{}' is not a local path; only stub:// and local files are supported",
            location
        ));
    }

    let path = Path::new(location);
    if path.is_dir() {
        #[cfg(feature = "ingest-image")]
        {
            return Ok(Box::new(ImageDirSource::open(path, settings.frame_limit)?));
        }
        #[cfg(not(feature = "ingest-image"))]
        {
            return Err(anyhow!(
                "image directory sources require the ingest-image feature"
            ));
        }
    }

    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(Box::new(VideoFileSource::open(path, settings.frame_limit)?))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(anyhow!(
            "video file sources require the ingest-file-ffmpeg feature"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_url_opens_synthetic_source() {
        let settings = SourceSettings {
            url: "stub://road".to_string(),
            ..SourceSettings::default()
        };
        let source = open_source(&settings).unwrap();
        assert!(source.describe().contains("stub://road"));
    }

    #[test]
    fn remote_urls_are_rejected() {
        let settings = SourceSettings {
            url: "rtsp://192.168.1.10/stream".to_string(),
            ..SourceSettings::default()
        };
        let err = open_source(&settings).err().unwrap();
        assert!(err.to_string().contains("not a local path"));
    }

    #[test]
    fn empty_location_is_rejected() {
        let settings = SourceSettings {
            url: "  ".to_string(),
            ..SourceSettings::default()
        };
        assert!(open_source(&settings).is_err());
    }
}
