//! Frame preprocessing: uniform resize to the network height, stride-aligned
//! crop and mean/scale normalization into an NCHW tensor.
//!
//! The network input width is derived from the first frame's aspect ratio
//! and fixed for the whole run. Frames with a different aspect ratio later in
//! the stream keep that width for engine configuration.

use crate::{
    constants::{IMAGE_MEAN, IMAGE_SCALE},
    utils::{image_conversion::bgr_mat_to_array, safe_cast::i32_to_usize},
    Error, Result,
};
use log::info;
use ndarray::{s, Array4, ArrayView3, Axis};
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
};

/// Network input width for a frame: the scaled width rounded down to a
/// multiple of `stride`
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn aligned_width(frame_width: usize, frame_height: usize, input_height: usize, stride: usize) -> usize {
    if frame_height == 0 || stride == 0 {
        return 0;
    }
    let scaled = frame_width as f64 * (input_height as f64 / frame_height as f64);
    (scaled / stride as f64) as usize * stride
}

/// Largest multiple of `stride` not exceeding `width`
#[must_use]
pub fn crop_to_stride(width: usize, stride: usize) -> usize {
    if stride == 0 {
        return width;
    }
    width - width % stride
}

/// Normalize an (H, W, C) 8-bit image into a (1, C, H, W) float tensor
/// with values `(pixel - 128) / 255`
#[must_use]
pub fn normalize(image: ArrayView3<u8>) -> Array4<f32> {
    image
        .permuted_axes([2, 0, 1])
        .mapv(|v| (f32::from(v) - IMAGE_MEAN) / IMAGE_SCALE)
        .insert_axis(Axis(0))
}

/// Geometry decided for one frame before resizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    /// `input_height / frame_height`
    pub input_scale: f32,
    /// Engine input shape, present only for the first frame of a run
    pub configure_shape: Option<[usize; 4]>,
}

/// Tensor ready for inference plus the scale it was produced with
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    /// Normalized (1, 3, H, W) tensor
    pub tensor: Array4<f32>,
    /// `input_height / frame_height`
    pub input_scale: f32,
    /// Engine input shape, present only for the first frame of a run
    pub configure_shape: Option<[usize; 4]>,
}

/// Per-run preprocessor holding the fixed network input width
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input_height: usize,
    stride: usize,
    base_width: Option<usize>,
}

impl Preprocessor {
    /// Create a preprocessor for the given network height and stride
    pub fn new(input_height: usize, stride: usize) -> Result<Self> {
        if input_height == 0 || stride == 0 {
            return Err(Error::InvalidInput(format!(
                "Input height ({input_height}) and stride ({stride}) must be positive"
            )));
        }
        Ok(Self {
            input_height,
            stride,
            base_width: None,
        })
    }

    /// Network input height
    #[must_use]
    pub fn input_height(&self) -> usize {
        self.input_height
    }

    /// Network stride
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Width fixed by the first frame, if one has been processed
    #[must_use]
    pub fn base_width(&self) -> Option<usize> {
        self.base_width
    }

    /// Scale and, while no width is fixed, the width the frame would fix
    #[allow(clippy::cast_precision_loss)]
    fn plan_frame(&self, frame_width: usize, frame_height: usize) -> Result<(f32, Option<usize>)> {
        if frame_width == 0 || frame_height == 0 {
            return Err(Error::InvalidInput(format!(
                "Frame has no pixels: {frame_width}x{frame_height}"
            )));
        }

        let input_scale = self.input_height as f32 / frame_height as f32;
        if self.base_width.is_some() {
            return Ok((input_scale, None));
        }

        let width = aligned_width(frame_width, frame_height, self.input_height, self.stride);
        if width == 0 {
            return Err(Error::InvalidInput(format!(
                "Frame {frame_width}x{frame_height} is too narrow for stride {}",
                self.stride
            )));
        }
        Ok((input_scale, Some(width)))
    }

    fn commit_width(&mut self, width: Option<usize>) -> Option<[usize; 4]> {
        let width = width?;
        info!("Network input shape fixed to 1x3x{}x{}", self.input_height, width);
        self.base_width = Some(width);
        Some([1, 3, self.input_height, width])
    }

    /// Decide scale and, on the first frame only, the engine input shape
    pub fn begin_frame(&mut self, frame_width: usize, frame_height: usize) -> Result<FrameGeometry> {
        let (input_scale, width) = self.plan_frame(frame_width, frame_height)?;
        Ok(FrameGeometry {
            input_scale,
            configure_shape: self.commit_width(width),
        })
    }

    /// Resize, crop and normalize a BGR frame. The network width is fixed
    /// only by the first frame that prepares successfully.
    pub fn prepare(&mut self, frame: &Mat) -> Result<PreparedFrame> {
        if frame.empty() {
            return Err(Error::InvalidInput("Empty frame".to_string()));
        }
        let (input_scale, first_width) =
            self.plan_frame(i32_to_usize(frame.cols())?, i32_to_usize(frame.rows())?)?;

        let mut scaled = Mat::default();
        imgproc::resize(
            frame,
            &mut scaled,
            Size::new(0, 0),
            f64::from(input_scale),
            f64::from(input_scale),
            imgproc::INTER_LINEAR,
        )?;

        let image = bgr_mat_to_array(&scaled)?;
        let width = crop_to_stride(image.dim().1, self.stride);
        if width == 0 {
            return Err(Error::InvalidInput(format!(
                "Scaled frame width {} is below the stride {}",
                image.dim().1,
                self.stride
            )));
        }
        let tensor = normalize(image.slice(s![.., ..width, ..]));

        Ok(PreparedFrame {
            tensor,
            input_scale,
            configure_shape: self.commit_width(first_width),
        })
    }
}
