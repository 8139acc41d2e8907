//! Lift 2D poses into root-relative 3D by reading the coordinate feature
//! maps, then recover each pose's camera-space translation.

use super::grouping::{BodyPose, NUM_BODY_KEYPOINTS};
use crate::constants::{
    AVG_PERSON_HEIGHT, EPSILON, MISSING_KEYPOINT, NUM_KEYPOINTS, POSE_2D_STRIDE, POSE_2D_VALUES, POSE_3D_STRIDE,
    POSE_3D_VALUES,
};
use ndarray::{ArrayView3, Axis};

/// COCO keypoint index to Panoptic keypoint index
pub const COCO_TO_PANOPTIC: [usize; NUM_BODY_KEYPOINTS] =
    [1, 0, 9, 10, 11, 3, 4, 5, 12, 13, 14, 6, 7, 8, 15, 16, 17, 18];

/// Panoptic neck index, the root the whole skeleton is first read at
pub const NECK: usize = 0;

/// Limb chains whose 3D coordinates are re-read at the first confident
/// keypoint of the chain
pub const LIMB_CHAINS: [[usize; 3]; 6] = [[18, 17, 1], [16, 15, 1], [5, 4, 3], [8, 7, 6], [11, 10, 9], [14, 13, 12]];

/// Repack a grouped COCO pose into the Panoptic 2D layout: 19 (x, y,
/// confidence) triples plus the pose score
#[must_use]
pub fn to_panoptic(pose: &BodyPose) -> [f32; POSE_2D_VALUES] {
    let mut packed = [MISSING_KEYPOINT; POSE_2D_VALUES];
    for (coco, keypoint) in pose.keypoints.iter().enumerate() {
        if let Some(peak) = keypoint {
            let base = COCO_TO_PANOPTIC[coco] * POSE_2D_STRIDE;
            packed[base] = peak.x;
            packed[base + 1] = peak.y;
            packed[base + 2] = peak.score;
        }
    }
    packed[POSE_2D_VALUES - 1] = pose.score;
    packed
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn map_location(x: f32, y: f32, features: &ArrayView3<f32>) -> (usize, usize) {
    let (_, height, width) = features.dim();
    let col = x.max(0.0) as usize;
    let row = y.max(0.0) as usize;
    (row.min(height.saturating_sub(1)), col.min(width.saturating_sub(1)))
}

fn read_keypoint(features: &ArrayView3<f32>, kpt: usize, x: f32, y: f32) -> [f32; 3] {
    let (row, col) = map_location(x, y, features);
    let base = kpt * 3;
    [
        features[[base, row, col]] * AVG_PERSON_HEIGHT,
        features[[base + 1, row, col]] * AVG_PERSON_HEIGHT,
        features[[base + 2, row, col]] * AVG_PERSON_HEIGHT,
    ]
}

/// Root-relative 3D pose (x, y, z, confidence per keypoint) in centimetres.
/// A pose whose neck is not confident stays at the missing marker.
#[must_use]
pub fn lift_pose(features: ArrayView3<f32>, pose_2d: &[f32; POSE_2D_VALUES], threshold: f32) -> [f32; POSE_3D_VALUES] {
    let mut pose_3d = [MISSING_KEYPOINT; POSE_3D_VALUES];
    let confidence = |kpt: usize| pose_2d[kpt * POSE_2D_STRIDE + 2];
    let location = |kpt: usize| (pose_2d[kpt * POSE_2D_STRIDE], pose_2d[kpt * POSE_2D_STRIDE + 1]);

    if confidence(NECK) > threshold {
        let (nx, ny) = location(NECK);
        for kpt in 0..NUM_KEYPOINTS {
            let xyz = read_keypoint(&features, kpt, nx, ny);
            pose_3d[kpt * POSE_3D_STRIDE..kpt * POSE_3D_STRIDE + 3].copy_from_slice(&xyz);
        }

        for chain in &LIMB_CHAINS {
            let Some(&from) = chain.iter().find(|&&kpt| confidence(kpt) > threshold) else {
                continue;
            };
            let (fx, fy) = location(from);
            for &kpt in chain {
                let xyz = read_keypoint(&features, kpt, fx, fy);
                pose_3d[kpt * POSE_3D_STRIDE..kpt * POSE_3D_STRIDE + 3].copy_from_slice(&xyz);
            }
        }
    }

    for kpt in 0..NUM_KEYPOINTS {
        pose_3d[kpt * POSE_3D_STRIDE + 3] = confidence(kpt);
    }
    pose_3d
}

/// Camera-space translation aligning the 3D pose with its 2D projection.
///
/// `pose_2d` is at feature-map resolution; `depth_scale` is
/// `focal_length * input_scale / stride`. Returns `None` when the pose has
/// no found keypoints or its 2D spread is degenerate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn recover_translation(
    pose_3d: &[f32; POSE_3D_VALUES],
    pose_2d: &[f32; POSE_2D_VALUES],
    features: ArrayView3<f32>,
    depth_scale: f32,
) -> Option<[f32; 3]> {
    let half_w = features.len_of(Axis(2)) as f32 / 2.0;
    let half_h = features.len_of(Axis(1)) as f32 / 2.0;

    let (points_2d, points_3d): (Vec<[f32; 2]>, Vec<[f32; 2]>) = (0..NUM_KEYPOINTS)
        .filter(|&kpt| pose_2d[kpt * POSE_2D_STRIDE + 2] != MISSING_KEYPOINT)
        .map(|kpt| {
            let b2 = kpt * POSE_2D_STRIDE;
            let b3 = kpt * POSE_3D_STRIDE;
            ([pose_2d[b2] - half_w, pose_2d[b2 + 1] - half_h], [pose_3d[b3], pose_3d[b3 + 1]])
        })
        .unzip();

    if points_2d.is_empty() {
        return None;
    }

    let mean = |points: &[[f32; 2]]| {
        let n = points.len() as f32;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        [sx / n, sy / n]
    };
    let spread = |points: &[[f32; 2]], m: [f32; 2]| {
        points
            .iter()
            .map(|p| (p[0] - m[0]).powi(2) + (p[1] - m[1]).powi(2))
            .sum::<f32>()
            .sqrt()
    };

    let mean_2d = mean(&points_2d);
    let mean_3d = mean(&points_3d);
    let numerator = spread(&points_3d, mean_3d);
    let denominator = spread(&points_2d, mean_2d);
    if denominator < EPSILON {
        return None;
    }

    let ratio = numerator / denominator;
    Some([
        ratio * mean_2d[0] - mean_3d[0],
        ratio * mean_2d[1] - mean_3d[1],
        ratio * depth_scale,
    ])
}

/// Shift the xyz of every keypoint by `translation`
pub fn apply_translation(pose_3d: &mut [f32; POSE_3D_VALUES], translation: [f32; 3]) {
    for keypoint in pose_3d.chunks_exact_mut(POSE_3D_STRIDE) {
        keypoint[0] += translation[0];
        keypoint[1] += translation[1];
        keypoint[2] += translation[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::grouping::Peak;
    use ndarray::Array3;

    fn pose_with(keypoints: &[(usize, f32, f32)]) -> [f32; POSE_2D_VALUES] {
        let mut pose = [MISSING_KEYPOINT; POSE_2D_VALUES];
        for &(kpt, x, y) in keypoints {
            pose[kpt * 3] = x;
            pose[kpt * 3 + 1] = y;
            pose[kpt * 3 + 2] = 0.9;
        }
        pose
    }

    #[test]
    fn test_to_panoptic_moves_neck_first() {
        let mut keypoints = [None; NUM_BODY_KEYPOINTS];
        keypoints[1] = Some(Peak { x: 5.0, y: 6.0, score: 0.7, id: 0 });
        let packed = to_panoptic(&BodyPose { keypoints, score: 2.5, count: 1 });
        assert_eq!(&packed[0..3], &[5.0, 6.0, 0.7]);
        // pelvis is never detected
        assert_eq!(packed[2 * 3 + 2], MISSING_KEYPOINT);
        assert_eq!(packed[POSE_2D_VALUES - 1], 2.5);
    }

    #[test]
    fn test_lift_reads_at_neck() {
        let mut features = Array3::<f32>::zeros((57, 4, 4));
        features[[0, 1, 2]] = 0.5;
        let pose_2d = pose_with(&[(NECK, 2.0, 1.0)]);
        let pose_3d = lift_pose(features.view(), &pose_2d, 0.1);
        assert!((pose_3d[0] - 90.0).abs() < 1e-4);
        assert_eq!(pose_3d[3], 0.9);
        assert_eq!(pose_3d[7], MISSING_KEYPOINT);
    }

    #[test]
    fn test_lift_without_neck_stays_missing() {
        let features = Array3::<f32>::ones((57, 4, 4));
        let pose_2d = pose_with(&[(3, 1.0, 1.0)]);
        let pose_3d = lift_pose(features.view(), &pose_2d, 0.1);
        assert_eq!(pose_3d[0], MISSING_KEYPOINT);
        assert_eq!(pose_3d[3 * 4 + 3], 0.9);
    }

    #[test]
    fn test_translation_depth_from_scale() {
        let features = Array3::<f32>::zeros((57, 10, 10));
        // 2D points 2 px apart around the map center, 3D points 20 cm apart
        let pose_2d = pose_with(&[(0, 5.0, 4.0), (1, 5.0, 6.0)]);
        let mut pose_3d = [MISSING_KEYPOINT; POSE_3D_VALUES];
        pose_3d[0..4].copy_from_slice(&[0.0, -10.0, 0.0, 0.9]);
        pose_3d[4..8].copy_from_slice(&[0.0, 10.0, 0.0, 0.9]);

        let t = recover_translation(&pose_3d, &pose_2d, features.view(), 100.0).unwrap();
        assert!(t[0].abs() < 1e-4);
        assert!(t[1].abs() < 1e-4);
        assert!((t[2] - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_translation_degenerate() {
        let features = Array3::<f32>::zeros((57, 10, 10));
        let pose_2d = pose_with(&[(0, 5.0, 5.0)]);
        let pose_3d = [0.0; POSE_3D_VALUES];
        assert!(recover_translation(&pose_3d, &pose_2d, features.view(), 100.0).is_none());
    }
}
