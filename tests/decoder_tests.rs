//! Decoder tests on synthetic network maps

use human_pose_3d::{
    config::{DecoderConfig, TrackingConfig},
    constants::{MISSING_KEYPOINT, POSE_2D_VALUES, POSE_3D_VALUES},
    decoder::{DecodeParams, HeatmapDecoder, PoseDecoder},
    inference::InferenceOutput,
    Result,
};
use ndarray::{Array3, Axis};

const MAP_HEIGHT: usize = 16;
const MAP_WIDTH: usize = 24;

fn params(is_video: bool) -> DecodeParams {
    DecodeParams {
        input_scale: 0.5,
        stride: 8,
        focal_length: 500.0,
        is_video,
    }
}

fn blank_output() -> InferenceOutput {
    InferenceOutput {
        features: Array3::zeros((57, MAP_HEIGHT, MAP_WIDTH)),
        heatmaps: Array3::zeros((19, MAP_HEIGHT, MAP_WIDTH)),
        pafs: Array3::zeros((38, MAP_HEIGHT, MAP_WIDTH)),
    }
}

/// Neck, right shoulder and right elbow in a horizontal line on row `y`
fn add_person(output: &mut InferenceOutput, y: usize) {
    output.heatmaps[[1, y, 4]] = 0.9;
    output.heatmaps[[2, y, 12]] = 0.9;
    output.heatmaps[[3, y, 20]] = 0.9;
}

fn person_output(rows: &[usize]) -> InferenceOutput {
    person_output_with_extent(rows, 0.1)
}

fn person_output_with_extent(rows: &[usize], extent: f32) -> InferenceOutput {
    let mut output = blank_output();
    for &y in rows {
        add_person(&mut output, y);
    }
    // neck -> shoulder and shoulder -> elbow fields point along +x
    output.pafs.index_axis_mut(Axis(0), 12).fill(1.0);
    output.pafs.index_axis_mut(Axis(0), 14).fill(1.0);
    // distinct camera-space x per keypoint so the pose has a 3D extent
    for kpt in 0..19 {
        output.features.index_axis_mut(Axis(0), kpt * 3).fill(kpt as f32 * extent);
    }
    output
}

fn decoder() -> HeatmapDecoder {
    HeatmapDecoder::new(DecoderConfig::default(), TrackingConfig::default())
}

#[test]
fn test_single_person_layout() -> Result<()> {
    let poses = decoder().decode(&person_output(&[4]), &params(false))?;

    assert_eq!(poses.len(), 1);
    assert_eq!(poses.poses_2d.ncols(), POSE_2D_VALUES);
    assert_eq!(poses.poses_3d.ncols(), POSE_3D_VALUES);

    // feature cell (4, 4) scaled by stride / input_scale
    assert_eq!(poses.poses_2d[[0, 0]], 64.0);
    assert_eq!(poses.poses_2d[[0, 1]], 64.0);
    assert!(poses.poses_2d[[0, POSE_2D_VALUES - 1]] > 0.0);

    let found = (0..19).filter(|k| poses.poses_2d[[0, k * 3 + 2]] != MISSING_KEYPOINT).count();
    assert_eq!(found, 3);
    Ok(())
}

#[test]
fn test_person_placed_in_front_of_camera() -> Result<()> {
    let poses = decoder().decode(&person_output(&[4]), &params(false))?;

    let neck_z = poses.poses_3d[[0, 2]];
    assert!(neck_z > 0.0, "depth {neck_z} should be positive");
    assert!(poses.poses_3d.iter().all(|v| v.is_finite()));

    // every lifted keypoint shares the recovered depth offset
    for kpt in 0..19 {
        assert!((poses.poses_3d[[0, kpt * 4 + 2]] - neck_z).abs() < 1e-3);
    }
    Ok(())
}

#[test]
fn test_two_people_kept_apart() -> Result<()> {
    let poses = decoder().decode(&person_output(&[4, 12]), &params(false))?;

    assert_eq!(poses.len(), 2);
    let mut neck_rows: Vec<f32> = (0..2).map(|p| poses.poses_2d[[p, 1]]).collect();
    neck_rows.sort_by(f32::total_cmp);
    assert_eq!(neck_rows, vec![64.0, 192.0]);
    Ok(())
}

#[test]
fn test_video_mode_stable_on_repeated_frame() -> Result<()> {
    let mut decoder = decoder();
    let output = person_output(&[4]);

    let first = decoder.decode(&output, &params(true))?;
    let second = decoder.decode(&output, &params(true))?;

    assert_eq!(first.poses_2d, second.poses_2d);
    for (a, b) in first.poses_3d.iter().zip(second.poses_3d.iter()) {
        assert!((a - b).abs() < 1e-3);
    }
    Ok(())
}

#[test]
fn test_video_mode_smooths_jumps() -> Result<()> {
    let mut video = decoder();
    let mut still = decoder();

    // same 2D pose, twice the 3D extent: the raw depth doubles
    let near = video.decode(&person_output_with_extent(&[4], 0.1), &params(true))?;
    let smoothed = video.decode(&person_output_with_extent(&[4], 0.2), &params(true))?;
    let raw = still.decode(&person_output_with_extent(&[4], 0.2), &params(false))?;

    assert_eq!(smoothed.poses_2d, raw.poses_2d);
    let (before, after, target) = (near.poses_3d[[0, 2]], smoothed.poses_3d[[0, 2]], raw.poses_3d[[0, 2]]);
    assert!((target - 2.0 * before).abs() < 1e-2);
    assert!(after > before && after < target, "{before} < {after} < {target}");
    Ok(())
}

#[test]
fn test_empty_frame_between_people() -> Result<()> {
    let mut decoder = decoder();
    assert_eq!(decoder.decode(&person_output(&[4]), &params(true))?.len(), 1);
    assert!(decoder.decode(&blank_output(), &params(true))?.is_empty());
    assert_eq!(decoder.decode(&person_output(&[4]), &params(true))?.len(), 1);
    Ok(())
}

#[test]
fn test_weak_peaks_ignored() -> Result<()> {
    let mut output = person_output(&[]);
    output.heatmaps[[1, 4, 4]] = 0.05;
    output.heatmaps[[2, 4, 12]] = 0.05;
    output.heatmaps[[3, 4, 20]] = 0.05;
    assert!(decoder().decode(&output, &params(false))?.is_empty());
    Ok(())
}
