//! Still-image directory source.
//!
//! Every `jpg`, `jpeg`, `png` or `bmp` file in a directory is one frame, in lexical
//! file-name order. Useful for replaying frames a capture device wrote to disk.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::error::PipelineError;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_limit: Option<u64>,
}

impl ImageDirSource {
    pub fn open(dir: &Path, frame_limit: Option<u64>) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("read image directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        files.sort();
        log::info!(
            "ImageDirSource: {} images in {}",
            files.len(),
            dir.display()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            frame_limit,
        })
    }
}

impl FrameSource for ImageDirSource {
    fn describe(&self) -> String {
        format!("{} (images)", self.dir.display())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.frame_limit {
            if self.cursor as u64 >= limit {
                return Ok(None);
            }
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                return Err(PipelineError::InvalidFrame(format!(
                    "decode image {}: {}",
                    path.display(),
                    e
                ))
                .into())
            }
        };
        let (width, height) = image.dimensions();
        Ok(Some(
            Frame::rgb(image.into_raw(), width, height).with_index(self.cursor as u64),
        ))
    }

    fn frames_read(&self) -> u64 {
        self.cursor as u64
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]))
            .save(dir.path().join("b.png"))
            .unwrap();
        image::RgbImage::from_pixel(6, 3, image::Rgb([0, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageDirSource::open(dir.path(), None).unwrap();
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height), (6, 3));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!((second.width, second.height), (4, 2));
        assert_eq!(&second.pixels()[..3], &[10, 20, 30]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn corrupt_image_is_reported_and_passed_over() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"not a jpeg").unwrap();
        image::RgbImage::from_pixel(3, 3, image::Rgb([4, 5, 6]))
            .save(dir.path().join("c.png"))
            .unwrap();

        let mut source = ImageDirSource::open(dir.path(), None).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidFrame(_))
        ));
        let third = source.next_frame().unwrap().unwrap();
        assert_eq!((third.width, third.height, third.index), (3, 3, 3));
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.frames_read(), 3);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageDirSource::open(dir.path(), None).is_err());
    }
}
