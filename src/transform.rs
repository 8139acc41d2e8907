//! Coordinate transformer: camera-space poses to a renderable world-space
//! scene with a multi-person edge list.

use crate::{
    calibration::Extrinsics,
    constants::{NUM_KEYPOINTS, POSE_3D_STRIDE, POSE_3D_VALUES},
    Error, Result,
};
use nalgebra::Vector3;
use ndarray::{Array2, Array3, Axis};

/// Bones of one Panoptic skeleton
pub const SKELETON_EDGES: [[usize; 2]; 17] = [
    [11, 10],
    [10, 9],
    [9, 0],
    [0, 3],
    [3, 4],
    [4, 5],
    [0, 6],
    [6, 7],
    [7, 8],
    [0, 12],
    [12, 13],
    [13, 14],
    [0, 1],
    [1, 15],
    [15, 16],
    [1, 17],
    [17, 18],
];

/// Viewer axis convention: `(x, y, z) -> (-z, x, -y)`
#[must_use]
pub fn remap_axes(p: [f32; 3]) -> [f32; 3] {
    [-p[2], p[0], -p[1]]
}

/// Edge template replicated for `num_poses` people, each copy offset by
/// `19 * person_index`
#[must_use]
pub fn skeleton_edges(num_poses: usize) -> Vec<[usize; 2]> {
    (0..num_poses)
        .flat_map(|person| {
            let offset = person * NUM_KEYPOINTS;
            SKELETON_EDGES.iter().map(move |&[a, b]| [a + offset, b + offset])
        })
        .collect()
}

/// Renderable 3D scene
#[derive(Debug, Clone, PartialEq)]
pub struct Scene3d {
    /// (N, 19, 3) world-space keypoints after the axis remap
    pub vertices: Array3<f32>,
    /// Indices into the flattened (N * 19) vertex list
    pub edges: Vec<[usize; 2]>,
}

impl Scene3d {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            vertices: Array3::zeros((0, NUM_KEYPOINTS, 3)),
            edges: Vec::new(),
        }
    }

    /// Number of people
    #[must_use]
    pub fn num_poses(&self) -> usize {
        self.vertices.len_of(Axis(0))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_poses() == 0
    }

    /// Vertex `index` of the flattened (N * 19) list
    #[must_use]
    pub fn vertex(&self, index: usize) -> Option<[f32; 3]> {
        let (person, kpt) = (index / NUM_KEYPOINTS, index % NUM_KEYPOINTS);
        if person >= self.num_poses() {
            return None;
        }
        Some([
            self.vertices[[person, kpt, 0]],
            self.vertices[[person, kpt, 1]],
            self.vertices[[person, kpt, 2]],
        ])
    }
}

/// Applies the inverse extrinsics and the viewer axis remap
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    extrinsics: Extrinsics,
}

impl CoordinateTransformer {
    #[must_use]
    pub fn new(extrinsics: Extrinsics) -> Self {
        Self { extrinsics }
    }

    #[must_use]
    pub fn extrinsics(&self) -> &Extrinsics {
        &self.extrinsics
    }

    fn check_width(poses_3d: &Array2<f32>) -> Result<()> {
        if poses_3d.ncols() != POSE_3D_VALUES {
            return Err(Error::InvalidInput(format!(
                "3D poses must have {POSE_3D_VALUES} values per person, got {}",
                poses_3d.ncols()
            )));
        }
        Ok(())
    }

    /// Map every keypoint of every pose to world space with `R⁻¹ (p - t)`;
    /// confidences are kept
    pub fn rotate_poses(&self, poses_3d: &Array2<f32>) -> Result<Array2<f32>> {
        Self::check_width(poses_3d)?;
        let mut rotated = poses_3d.clone();
        for mut pose in rotated.rows_mut() {
            for kpt in 0..NUM_KEYPOINTS {
                let base = kpt * POSE_3D_STRIDE;
                let p = Vector3::new(pose[base], pose[base + 1], pose[base + 2]);
                let w = self.extrinsics.camera_to_world(&p);
                pose[base] = w.x;
                pose[base + 1] = w.y;
                pose[base + 2] = w.z;
            }
        }
        Ok(rotated)
    }

    /// Build the scene for a frame's camera-space poses
    pub fn build_scene(&self, poses_3d: &Array2<f32>) -> Result<Scene3d> {
        Self::check_width(poses_3d)?;
        let num_poses = poses_3d.nrows();
        if num_poses == 0 {
            return Ok(Scene3d::empty());
        }

        let world = self.rotate_poses(poses_3d)?;
        let vertices = Array3::from_shape_fn((num_poses, NUM_KEYPOINTS, 3), |(person, kpt, axis)| {
            let base = kpt * POSE_3D_STRIDE;
            let p = [world[[person, base]], world[[person, base + 1]], world[[person, base + 2]]];
            remap_axes(p)[axis]
        });

        Ok(Scene3d {
            vertices,
            edges: skeleton_edges(num_poses),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    #[test]
    fn test_remap_axes() {
        assert_eq!(remap_axes([1.0, 2.0, 3.0]), [-3.0, 1.0, -2.0]);
    }

    #[test]
    fn test_skeleton_edges_offsets() {
        let edges = skeleton_edges(2);
        assert_eq!(edges.len(), 34);
        assert_eq!(edges[0], [11, 10]);
        assert_eq!(edges[17], [30, 29]);
    }

    #[test]
    fn test_empty_scene() {
        let transformer = CoordinateTransformer::new(Extrinsics::identity());
        let scene = transformer.build_scene(&Array2::zeros((0, POSE_3D_VALUES))).unwrap();
        assert!(scene.is_empty());
        assert!(scene.edges.is_empty());
    }

    #[test]
    fn test_rejects_wrong_width() {
        let transformer = CoordinateTransformer::new(Extrinsics::identity());
        assert!(matches!(
            transformer.build_scene(&Array2::zeros((1, 75))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_translation_then_remap() {
        let extrinsics = Extrinsics::new(Matrix3::identity(), Vector3::new(1.0, 2.0, 3.0)).unwrap();
        let transformer = CoordinateTransformer::new(extrinsics);
        let mut poses = Array2::<f32>::zeros((1, POSE_3D_VALUES));
        poses[[0, 0]] = 2.0;
        poses[[0, 1]] = 4.0;
        poses[[0, 2]] = 6.0;
        poses[[0, 3]] = 0.7;

        let rotated = transformer.rotate_poses(&poses).unwrap();
        assert_eq!(rotated[[0, 3]], 0.7);

        let scene = transformer.build_scene(&poses).unwrap();
        // (2,4,6) - (1,2,3) = (1,2,3) -> (-3, 1, -2)
        assert_eq!(scene.vertex(0), Some([-3.0, 1.0, -2.0]));
        assert_eq!(scene.vertex(19), None);
    }
}
