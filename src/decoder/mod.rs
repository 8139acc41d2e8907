//! Pose decoder: turns raw network maps into 2D and 3D pose arrays.

pub mod grouping;
pub mod lifting;
pub mod tracking;

use crate::{
    config::{DecoderConfig, TrackingConfig},
    constants::{MISSING_KEYPOINT, NUM_KEYPOINTS, POSE_2D_STRIDE, POSE_2D_VALUES, POSE_3D_VALUES},
    inference::InferenceOutput,
    Error, Result,
};
use log::debug;
use ndarray::{Array2, ArrayView1};

use grouping::{extract_all_peaks, group_keypoints, NUM_BODY_KEYPOINTS};
use lifting::{apply_translation, lift_pose, recover_translation, to_panoptic};
use tracking::PoseTracker;

const FEATURE_CHANNELS: usize = NUM_KEYPOINTS * 3;
const PAF_CHANNELS: usize = 38;

/// Per-frame decoding parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    /// `input_height / frame_height`
    pub input_scale: f32,
    /// Network output stride
    pub stride: usize,
    /// Focal length estimate in pixels
    pub focal_length: f32,
    /// Track people across frames
    pub is_video: bool,
}

/// Poses found in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPoses {
    /// (N, 76): (x, y, z, confidence) × 19 in camera space, centimetres
    pub poses_3d: Array2<f32>,
    /// (N, 58): (x, y, confidence) × 19 in frame pixels, then the pose score
    pub poses_2d: Array2<f32>,
}

impl DecodedPoses {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            poses_3d: Array2::zeros((0, POSE_3D_VALUES)),
            poses_2d: Array2::zeros((0, POSE_2D_VALUES)),
        }
    }

    /// Number of people
    #[must_use]
    pub fn len(&self) -> usize {
        self.poses_3d.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts engine output into poses
pub trait PoseDecoder {
    fn decode(&mut self, output: &InferenceOutput, params: &DecodeParams) -> Result<DecodedPoses>;
}

/// Heatmap and part affinity field decoder for the lightweight 3D pose
/// network
#[derive(Debug, Clone)]
pub struct HeatmapDecoder {
    config: DecoderConfig,
    tracker: PoseTracker,
}

impl HeatmapDecoder {
    #[must_use]
    pub fn new(config: DecoderConfig, tracking: TrackingConfig) -> Self {
        Self {
            config,
            tracker: PoseTracker::new(tracking),
        }
    }

    fn check_shapes(output: &InferenceOutput) -> Result<()> {
        let (fc, fh, fw) = output.features.dim();
        let (hc, hh, hw) = output.heatmaps.dim();
        let (pc, ph, pw) = output.pafs.dim();
        if fc < FEATURE_CHANNELS || hc < NUM_BODY_KEYPOINTS || pc < PAF_CHANNELS {
            return Err(Error::DecoderError(format!(
                "Unexpected channel counts: features {fc}, heatmaps {hc}, pafs {pc}"
            )));
        }
        if (fh, fw) != (hh, hw) || (hh, hw) != (ph, pw) {
            return Err(Error::DecoderError(format!(
                "Map sizes differ: features {fh}x{fw}, heatmaps {hh}x{hw}, pafs {ph}x{pw}"
            )));
        }
        Ok(())
    }
}

/// Scale a feature-resolution 2D pose to frame pixels, truncating toward
/// zero; missing keypoints keep the marker in all three slots
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scale_pose_2d(pose: &[f32; POSE_2D_VALUES], stride: usize, input_scale: f32) -> [f32; POSE_2D_VALUES] {
    let factor = stride as f32 / input_scale;
    let mut scaled = [MISSING_KEYPOINT; POSE_2D_VALUES];
    for kpt in 0..NUM_KEYPOINTS {
        let base = kpt * POSE_2D_STRIDE;
        if pose[base + 2] != MISSING_KEYPOINT {
            scaled[base] = (pose[base] * factor).trunc();
            scaled[base + 1] = (pose[base + 1] * factor).trunc();
            scaled[base + 2] = pose[base + 2];
        }
    }
    scaled[POSE_2D_VALUES - 1] = pose[POSE_2D_VALUES - 1];
    scaled
}

impl PoseDecoder for HeatmapDecoder {
    #[allow(clippy::cast_precision_loss)]
    fn decode(&mut self, output: &InferenceOutput, params: &DecodeParams) -> Result<DecodedPoses> {
        Self::check_shapes(output)?;
        if params.stride == 0 || params.input_scale <= 0.0 {
            return Err(Error::DecoderError(format!(
                "Invalid scale {} or stride {}",
                params.input_scale, params.stride
            )));
        }

        let peaks = extract_all_peaks(output.heatmaps.view(), &self.config);
        let grouped = group_keypoints(&peaks, output.pafs.view(), &self.config);
        let poses_2d: Vec<[f32; POSE_2D_VALUES]> = grouped.iter().map(to_panoptic).collect();
        debug!("Decoded {} poses from {} peaks", poses_2d.len(), peaks.iter().map(Vec::len).sum::<usize>());

        let ids = if params.is_video {
            Some(self.tracker.update(&poses_2d))
        } else {
            None
        };

        let depth_scale = params.focal_length * params.input_scale / params.stride as f32;
        let mut decoded = DecodedPoses {
            poses_3d: Array2::zeros((poses_2d.len(), POSE_3D_VALUES)),
            poses_2d: Array2::zeros((poses_2d.len(), POSE_2D_VALUES)),
        };

        for (i, pose_2d) in poses_2d.iter().enumerate() {
            let mut pose_3d = lift_pose(output.features.view(), pose_2d, self.config.keypoint_threshold);
            if let Some(mut translation) = recover_translation(&pose_3d, pose_2d, output.features.view(), depth_scale) {
                if let Some(ids) = &ids {
                    translation = self.tracker.smooth_translation(ids[i], translation);
                }
                apply_translation(&mut pose_3d, translation);
            }

            let scaled = scale_pose_2d(pose_2d, params.stride, params.input_scale);
            decoded.poses_3d.row_mut(i).assign(&ArrayView1::from(&pose_3d[..]));
            decoded.poses_2d.row_mut(i).assign(&ArrayView1::from(&scaled[..]));
        }

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Axis};

    fn params() -> DecodeParams {
        DecodeParams {
            input_scale: 0.5,
            stride: 8,
            focal_length: 500.0,
            is_video: false,
        }
    }

    fn blank_output(h: usize, w: usize) -> InferenceOutput {
        InferenceOutput {
            features: Array3::zeros((57, h, w)),
            heatmaps: Array3::zeros((19, h, w)),
            pafs: Array3::zeros((38, h, w)),
        }
    }

    #[test]
    fn test_blank_maps_give_no_poses() {
        let mut decoder = HeatmapDecoder::new(DecoderConfig::default(), TrackingConfig::default());
        let poses = decoder.decode(&blank_output(16, 20), &params()).unwrap();
        assert!(poses.is_empty());
        assert_eq!(poses.poses_3d.ncols(), POSE_3D_VALUES);
        assert_eq!(poses.poses_2d.ncols(), POSE_2D_VALUES);
    }

    #[test]
    fn test_rejects_wrong_channels() {
        let mut decoder = HeatmapDecoder::new(DecoderConfig::default(), TrackingConfig::default());
        let mut output = blank_output(8, 8);
        output.pafs = Array3::zeros((10, 8, 8));
        assert!(matches!(decoder.decode(&output, &params()), Err(Error::DecoderError(_))));
    }

    #[test]
    fn test_synthetic_person() {
        let mut decoder = HeatmapDecoder::new(DecoderConfig::default(), TrackingConfig::default());
        let mut output = blank_output(16, 24);
        // neck (1) at (4,4), right shoulder (2) at (12,4), right elbow (3) at (20,4)
        output.heatmaps[[1, 4, 4]] = 0.9;
        output.heatmaps[[2, 4, 12]] = 0.9;
        output.heatmaps[[3, 4, 20]] = 0.9;
        output.pafs.index_axis_mut(Axis(0), 12).fill(1.0);
        output.pafs.index_axis_mut(Axis(0), 14).fill(1.0);

        let poses = decoder.decode(&output, &params()).unwrap();
        assert_eq!(poses.len(), 1);
        // neck lands at index 0 scaled by stride / input_scale = 16
        assert_eq!(poses.poses_2d[[0, 0]], 64.0);
        assert_eq!(poses.poses_2d[[0, 1]], 64.0);
        assert_eq!(poses.poses_2d[[0, 2 * 3 + 2]], MISSING_KEYPOINT);
    }

    #[test]
    fn test_scale_pose_2d_truncates() {
        let mut pose = [MISSING_KEYPOINT; POSE_2D_VALUES];
        pose[0..3].copy_from_slice(&[3.3, 1.9, 0.8]);
        pose[POSE_2D_VALUES - 1] = 4.0;
        let scaled = scale_pose_2d(&pose, 8, 3.0);
        assert_eq!(&scaled[0..3], &[8.0, 5.0, 0.8]);
        assert_eq!(scaled[3], MISSING_KEYPOINT);
        assert_eq!(scaled[POSE_2D_VALUES - 1], 4.0);
    }
}
