//! Monocular 3D human pose estimation library.
//!
//! Frames from a camera, video file or still image go through:
//! 1. Preprocessing into a normalized, stride-aligned tensor
//! 2. Neural inference with ONNX Runtime producing heatmaps, part affinity
//!    fields and 3D coordinate maps
//! 3. Decoding into 2D and 3D skeletons of 19 keypoints per person
//! 4. A world-space transform using the camera extrinsics
//! 5. Rendering of a 2D overlay and an interactive 3D canvas
//!
//! # Examples
//!
//! ## Single image
//!
//! ```no_run
//! use human_pose_3d::{
//!     calibration::Extrinsics,
//!     config::Config,
//!     decoder::{DecodeParams, HeatmapDecoder, PoseDecoder},
//!     inference::{InferenceEngine, OnnxEngine},
//!     preprocessing::Preprocessor,
//!     transform::CoordinateTransformer,
//! };
//! use opencv::{imgcodecs, prelude::*};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut engine = OnnxEngine::new("human-pose-estimation-3d.onnx")?;
//! let mut decoder = HeatmapDecoder::new(config.decoder.clone(), config.tracking.clone());
//! let transformer = CoordinateTransformer::new(Extrinsics::from_file("extrinsics.json")?);
//! let mut preprocessor = Preprocessor::new(256, 8)?;
//!
//! let image = imgcodecs::imread("person.jpg", imgcodecs::IMREAD_COLOR)?;
//! let prepared = preprocessor.prepare(&image)?;
//! if let Some(shape) = prepared.configure_shape {
//!     engine.configure(shape)?;
//! }
//! let output = engine.run(&prepared.tensor)?;
//!
//! let params = DecodeParams {
//!     input_scale: prepared.input_scale,
//!     stride: 8,
//!     focal_length: 0.8 * image.cols() as f32,
//!     is_video: false,
//! };
//! let poses = decoder.decode(&output, &params)?;
//! let scene = transformer.build_scene(&poses.poses_3d)?;
//! println!("{} people, {} bones", poses.len(), scene.edges.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Playback state machine
//!
//! ```
//! use human_pose_3d::playback::{KeyEvent, PlaybackState};
//!
//! let paused = PlaybackState::Running.transition(KeyEvent::from_code(112), true);
//! assert_eq!(paused, PlaybackState::FreeRotate);
//! assert_eq!(paused.transition(KeyEvent::Resume, true), PlaybackState::Running);
//! ```

/// Main application module
pub mod app;

/// Camera extrinsics loading and transforms
pub mod calibration;

/// Command-line interface
pub mod cli;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Heatmap and part affinity field decoding into poses
pub mod decoder;

/// Error types and result handling
pub mod error;

/// Smoothed frame rate meter
pub mod fps;

/// Inference engine interface and ONNX Runtime backend
pub mod inference;

/// Interactive playback state machine
pub mod playback;

/// Frame preprocessing into network tensors
pub mod preprocessing;

/// 3D canvas and 2D overlay drawing
pub mod render;

/// Camera, video and image frame sources
pub mod source;

/// Camera-to-world transform and skeleton assembly
pub mod transform;

/// Utility functions for image conversion and pixel coordinates
pub mod utils;

pub use error::{Error, Result};
