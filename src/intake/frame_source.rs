use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::common::Frame;
use crate::error::AppError;

/// A camera-like stream of frames.
pub trait FrameSource: Send {
    /// `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Option<Result<Frame, AppError>>;
}

/// Replays the image files of a directory in file-name order.
pub struct ImageDirectorySource {
    paths: std::vec::IntoIter<PathBuf>,
}

impl ImageDirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            } else {
                tracing::debug!("Skipping non-image entry {}", path.display());
            }
        }
        paths.sort();
        tracing::info!("Replaying {} frames from {}", paths.len(), dir.as_ref().display());
        Ok(Self {
            paths: paths.into_iter(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageDirectorySource {
    fn next_frame(&mut self) -> Option<Result<Frame, AppError>> {
        let path = self.paths.next()?;
        Some(
            image::open(&path)
                .map(Frame::from_dynamic)
                .map_err(AppError::from),
        )
    }
}
