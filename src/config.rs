//! Configuration management for the 3D pose estimation application

use crate::{
    constants::{
        CANVAS_WINDOW_NAME, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_INPUT_HEIGHT, DEFAULT_STRIDE,
        DEFAULT_WARMUP_RUNS, FOCAL_LENGTH_FACTOR, FPS_SMOOTHING, FRAME_WINDOW_NAME, ROTATE_POLL_MS,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model and calibration file paths
    pub models: ModelConfig,

    /// Network input configuration
    pub inference: InferenceConfig,

    /// Pose decoder thresholds
    pub decoder: DecoderConfig,

    /// Pose tracking in video mode
    pub tracking: TrackingConfig,

    /// Display configuration
    pub display: DisplayConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the 3D pose ONNX model
    pub pose_model: PathBuf,

    /// Path to the extrinsic calibration (JSON with `R` and `t`)
    pub extrinsics: PathBuf,
}

/// Network input parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Network input height in pixels
    pub input_height: usize,

    /// Network output stride
    pub stride: usize,

    /// Inference runs per image in single-image mode
    pub warmup_runs: usize,

    /// Focal length as a fraction of the first frame's width
    pub focal_length_factor: f32,
}

/// Heatmap decoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Minimum heatmap value for a keypoint peak
    pub peak_threshold: f32,

    /// Peaks closer than this (in feature cells) are suppressed
    pub nms_radius: f32,

    /// Minimum PAF alignment for a sample point to count
    pub min_paf_score: f32,

    /// Fraction of sample points that must pass `min_paf_score`
    pub min_paf_ratio: f32,

    /// Poses with fewer keypoints are dropped
    pub min_pose_keypoints: usize,

    /// Poses with a lower mean score are dropped
    pub min_pose_score: f32,

    /// Minimum 2D confidence for reading 3D coordinates at a keypoint
    pub keypoint_threshold: f32,
}

/// Video-mode pose tracking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum keypoint similarity to keep a pose's identity
    pub similarity_threshold: f32,

    /// Nominal sample rate of the translation filter
    pub filter_frequency: f32,

    /// One Euro minimum cutoff frequency
    pub min_cutoff: f32,

    /// One Euro speed coefficient
    pub beta: f32,

    /// One Euro derivative cutoff frequency
    pub d_cutoff: f32,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 3D canvas width
    pub canvas_width: i32,

    /// 3D canvas height
    pub canvas_height: i32,

    /// Title of the 3D canvas window
    pub canvas_window: String,

    /// Title of the annotated frame window
    pub frame_window: String,

    /// Key poll interval while rotating a paused scene
    pub rotate_poll_ms: i32,

    /// Weight of a new frame time in the FPS moving average
    pub fps_smoothing: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pose_model: PathBuf::from("assets/human-pose-estimation-3d.onnx"),
            extrinsics: PathBuf::from("data/extrinsics.json"),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            input_height: DEFAULT_INPUT_HEIGHT,
            stride: DEFAULT_STRIDE,
            warmup_runs: DEFAULT_WARMUP_RUNS,
            focal_length_factor: FOCAL_LENGTH_FACTOR,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            peak_threshold: 0.1,
            nms_radius: 6.0,
            min_paf_score: 0.05,
            min_paf_ratio: 0.8,
            min_pose_keypoints: 3,
            min_pose_score: 0.2,
            keypoint_threshold: 0.1,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            filter_frequency: 80.0,
            min_cutoff: 1.0,
            beta: 0.01,
            d_cutoff: 1.0,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            canvas_window: CANVAS_WINDOW_NAME.to_string(),
            frame_window: FRAME_WINDOW_NAME.to_string(),
            rotate_poll_ms: ROTATE_POLL_MS,
            fps_smoothing: FPS_SMOOTHING,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.inference.input_height == 0 {
            return Err(Error::ConfigError("Input height must be greater than 0".to_string()));
        }
        if self.inference.stride == 0 {
            return Err(Error::ConfigError("Stride must be greater than 0".to_string()));
        }
        if self.inference.input_height % self.inference.stride != 0 {
            return Err(Error::ConfigError(format!(
                "Input height {} must be a multiple of the stride {}",
                self.inference.input_height, self.inference.stride
            )));
        }
        if self.inference.warmup_runs == 0 {
            return Err(Error::ConfigError("Warm-up runs must be at least 1".to_string()));
        }
        if self.inference.focal_length_factor <= 0.0 {
            return Err(Error::ConfigError("Focal length factor must be positive".to_string()));
        }

        if !(0.0..=1.0).contains(&self.decoder.peak_threshold) {
            return Err(Error::ConfigError("Peak threshold must be between 0.0 and 1.0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.decoder.min_paf_ratio) {
            return Err(Error::ConfigError("PAF ratio must be between 0.0 and 1.0".to_string()));
        }
        if self.decoder.min_pose_keypoints == 0 {
            return Err(Error::ConfigError(
                "Minimum pose keypoints must be greater than 0".to_string(),
            ));
        }

        if self.tracking.filter_frequency <= 0.0 {
            return Err(Error::ConfigError("Filter frequency must be positive".to_string()));
        }
        if self.tracking.min_cutoff <= 0.0 || self.tracking.d_cutoff <= 0.0 {
            return Err(Error::ConfigError("Filter cutoffs must be positive".to_string()));
        }

        if self.display.canvas_width <= 0 || self.display.canvas_height <= 0 {
            return Err(Error::ConfigError("Canvas size must be positive".to_string()));
        }
        if self.display.rotate_poll_ms <= 0 {
            return Err(Error::ConfigError("Rotate poll interval must be positive".to_string()));
        }
        if self.display.fps_smoothing <= 0.0 || self.display.fps_smoothing > 1.0 {
            return Err(Error::ConfigError("FPS smoothing must be in (0, 1]".to_string()));
        }

        Ok(())
    }

    /// Check that the model and calibration files exist
    pub fn check_files(&self) -> Result<()> {
        if !self.models.pose_model.exists() {
            return Err(Error::ConfigError(format!(
                "Pose model not found: {}",
                self.models.pose_model.display()
            )));
        }
        if !self.models.extrinsics.exists() {
            return Err(Error::ConfigError(format!(
                "Extrinsics file not found: {}",
                self.models.extrinsics.display()
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# 3D Human Pose Estimation Configuration

# Model and calibration paths
models:
  pose_model: "assets/human-pose-estimation-3d.onnx"
  extrinsics: "data/extrinsics.json"

# Network input
inference:
  input_height: 256
  stride: 8
  warmup_runs: 5
  focal_length_factor: 0.8

# Heatmap decoding
decoder:
  peak_threshold: 0.1
  nms_radius: 6.0
  min_paf_score: 0.05
  min_paf_ratio: 0.8
  min_pose_keypoints: 3
  min_pose_score: 0.2
  keypoint_threshold: 0.1

# Pose tracking (video mode)
tracking:
  similarity_threshold: 0.5
  filter_frequency: 80.0
  min_cutoff: 1.0
  beta: 0.01
  d_cutoff: 1.0

# Display settings
display:
  canvas_width: 1280
  canvas_height: 720
  canvas_window: "Canvas3D"
  frame_window: "ICV 3D Human Pose Estimation"
  rotate_poll_ms: 33
  fps_smoothing: 0.05
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.inference.input_height, 256);
        assert_eq!(config.inference.stride, 8);
        assert_eq!(config.display.canvas_window, "Canvas3D");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("inference:\n  stride: 4\n").unwrap();
        assert_eq!(config.inference.stride, 4);
        assert_eq!(config.inference.input_height, DEFAULT_INPUT_HEIGHT);
        assert_eq!(config.display.rotate_poll_ms, ROTATE_POLL_MS);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.inference.stride = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.inference.input_height = 250;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.display.fps_smoothing = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.inference.warmup_runs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_check_files_missing() {
        let mut config = Config::default();
        config.models.pose_model = PathBuf::from("/nonexistent/model.onnx");
        match config.check_files() {
            Err(Error::ConfigError(msg)) => assert!(msg.contains("Pose model not found")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }
}
