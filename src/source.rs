//! Frame sources: camera, video file and still images.
//!
//! A source yields frames lazily; `Ok(None)` signals end-of-stream.

use crate::{Error, Result};
use log::{debug, info};
use opencv::{
    core::Mat,
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::PathBuf;

/// A lazy, possibly infinite sequence of frames
pub trait FrameSource {
    /// Frame type produced by this source
    type Frame;

    /// Fetch the next frame, or `None` at end-of-stream
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;
}

/// Video input selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(PathBuf),
}

impl VideoSource {
    /// Interpret a `--video` argument: an integer selects a camera index
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i32>() {
            Ok(index) => Self::Camera(index),
            Err(_) => Self::File(PathBuf::from(value)),
        }
    }
}

/// Frames from a camera or a video file
pub struct VideoReader {
    capture: VideoCapture,
    source: VideoSource,
}

impl VideoReader {
    /// Open a camera or video file
    pub fn open(source: VideoSource) -> Result<Self> {
        let capture = match &source {
            VideoSource::Camera(index) => {
                info!("Opening camera {}", index);
                VideoCapture::new(*index, videoio::CAP_ANY)?
            }
            VideoSource::File(path) => {
                info!("Opening video file: {}", path.display());
                VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?
            }
        };

        if !capture.is_opened()? {
            return Err(Error::SourceError(format!("Cannot open video source {:?}", source)));
        }

        Ok(Self { capture, source })
    }

    /// The source this reader was opened from
    #[must_use]
    pub fn source(&self) -> &VideoSource {
        &self.source
    }
}

impl FrameSource for VideoReader {
    type Frame = Mat;

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            debug!("Video source {:?} returned no frame", self.source);
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// Frames read from a list of image files
pub struct ImageReader {
    paths: std::vec::IntoIter<PathBuf>,
}

impl ImageReader {
    /// Create a reader over the given image paths
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
        }
    }
}

impl FrameSource for ImageReader {
    type Frame = Mat;

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };

        let image = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
        if image.empty() {
            return Err(Error::SourceError(format!("Image {} cannot be read", path.display())));
        }
        debug!("Read image {} ({}x{})", path.display(), image.cols(), image.rows());
        Ok(Some(image))
    }
}
