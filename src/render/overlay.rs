//! 2D skeleton and FPS overlay drawn onto the input frame.

use crate::{
    constants::{MISSING_KEYPOINT, NUM_KEYPOINTS, POSE_2D_STRIDE, POSE_2D_VALUES},
    utils::to_pixel,
    Error, Result,
};
use ndarray::{Array2, ArrayView1};
use opencv::{
    core::{Mat, Point, Scalar},
    imgproc::{self, FONT_HERSHEY_COMPLEX, LINE_AA, LINE_8},
};

/// Bones drawn on the frame, Panoptic indices
pub const BODY_EDGES: [[usize; 2]; 17] = [
    [0, 1],
    [1, 16],
    [16, 18],
    [1, 15],
    [15, 17],
    [0, 3],
    [3, 4],
    [4, 5],
    [0, 9],
    [9, 10],
    [10, 11],
    [0, 6],
    [6, 7],
    [7, 8],
    [0, 12],
    [12, 13],
    [13, 14],
];

const BONE_THICKNESS: i32 = 4;
const KEYPOINT_RADIUS: i32 = 3;

fn keypoint(pose: &ArrayView1<f32>, kpt: usize) -> (Point, f32) {
    let base = kpt * POSE_2D_STRIDE;
    (to_pixel(pose[base], pose[base + 1]), pose[base + 2])
}

/// Draw bones whose two keypoints were found and every found keypoint
pub fn draw_poses(frame: &mut Mat, poses_2d: &Array2<f32>) -> Result<()> {
    if poses_2d.nrows() > 0 && poses_2d.ncols() != POSE_2D_VALUES {
        return Err(Error::InvalidInput(format!(
            "2D poses must have {POSE_2D_VALUES} values per person, got {}",
            poses_2d.ncols()
        )));
    }

    let bone_color = Scalar::new(255.0, 255.0, 0.0, 0.0);
    let joint_color = Scalar::new(0.0, 255.0, 255.0, 0.0);

    for pose in poses_2d.rows() {
        for &[a, b] in &BODY_EDGES {
            let (pa, ca) = keypoint(&pose, a);
            let (pb, cb) = keypoint(&pose, b);
            if ca > 0.0 && cb > 0.0 {
                imgproc::line(frame, pa, pb, bone_color, BONE_THICKNESS, LINE_AA, 0)?;
            }
        }
        for kpt in 0..NUM_KEYPOINTS {
            let (p, confidence) = keypoint(&pose, kpt);
            if confidence != MISSING_KEYPOINT {
                imgproc::circle(frame, p, KEYPOINT_RADIUS, joint_color, -1, LINE_AA, 0)?;
            }
        }
    }
    Ok(())
}

/// `FPS: <value>` in the top-left corner
pub fn draw_fps(frame: &mut Mat, fps: f64) -> Result<()> {
    imgproc::put_text(
        frame,
        &format!("FPS: {fps:.1}"),
        Point::new(40, 80),
        FONT_HERSHEY_COMPLEX,
        1.0,
        Scalar::new(0.0, 0.0, 255.0, 0.0),
        1,
        LINE_8,
        false,
    )?;
    Ok(())
}
