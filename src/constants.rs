//! Constants used throughout the application

/// Number of keypoints in the Panoptic skeleton produced by the decoder
pub const NUM_KEYPOINTS: usize = 19;

/// Values per 3D keypoint (x, y, z, confidence)
pub const POSE_3D_STRIDE: usize = 4;

/// Flattened length of one 3D pose (19 keypoints × 4 values)
pub const POSE_3D_VALUES: usize = NUM_KEYPOINTS * POSE_3D_STRIDE;

/// Values per 2D keypoint (x, y, confidence)
pub const POSE_2D_STRIDE: usize = 3;

/// Flattened length of one 2D pose (19 keypoints × 3 values + pose score)
pub const POSE_2D_VALUES: usize = NUM_KEYPOINTS * POSE_2D_STRIDE + 1;

/// Confidence value marking a keypoint that was not found
pub const MISSING_KEYPOINT: f32 = -1.0;

/// Network input height in pixels
pub const DEFAULT_INPUT_HEIGHT: usize = 256;

/// Output stride of the network relative to its input
pub const DEFAULT_STRIDE: usize = 8;

/// Image normalization constants (pixel - mean) / scale
pub const IMAGE_MEAN: f32 = 128.0;
pub const IMAGE_SCALE: f32 = 255.0;

/// Focal length estimate as a fraction of the first frame's width
pub const FOCAL_LENGTH_FACTOR: f32 = 0.8;

/// Number of inference runs in single-image mode
pub const DEFAULT_WARMUP_RUNS: usize = 5;

/// Weight of a new frame time in the FPS moving average
pub const FPS_SMOOTHING: f64 = 0.05;

/// Average person height in centimeters used to scale the feature maps
pub const AVG_PERSON_HEIGHT: f32 = 180.0;

/// 3D canvas size
pub const DEFAULT_CANVAS_WIDTH: i32 = 1280;
pub const DEFAULT_CANVAS_HEIGHT: i32 = 720;

/// Window names
pub const CANVAS_WINDOW_NAME: &str = "Canvas3D";
pub const FRAME_WINDOW_NAME: &str = "ICV 3D Human Pose Estimation";

/// Keyboard codes returned by `highgui::wait_key`
pub const KEY_ESCAPE: i32 = 27;
pub const KEY_PAUSE: i32 = 112; // 'p'
pub const KEY_SPACE: i32 = 32;

/// Key poll intervals in milliseconds
pub const RUNNING_DELAY_MS: i32 = 1;
pub const FROZEN_DELAY_MS: i32 = 0;
pub const ROTATE_POLL_MS: i32 = 33;

/// Numeric precision epsilon
pub const EPSILON: f32 = 1e-6;
