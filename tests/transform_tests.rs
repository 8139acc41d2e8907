//! Property tests for the coordinate transformer

use human_pose_3d::{
    calibration::Extrinsics,
    constants::POSE_3D_VALUES,
    transform::{remap_axes, skeleton_edges, CoordinateTransformer, SKELETON_EDGES},
};
use nalgebra::{Rotation3, Vector3};
use ndarray::Array2;
use proptest::prelude::*;

fn coordinate() -> impl Strategy<Value = f32> {
    -1000.0f32..1000.0
}

fn angle() -> impl Strategy<Value = f32> {
    -std::f32::consts::PI..std::f32::consts::PI
}

proptest! {
    #[test]
    fn prop_remap_is_permutation_with_sign_flip(x in coordinate(), y in coordinate(), z in coordinate()) {
        let [a, b, c] = remap_axes([x, y, z]);
        prop_assert_eq!(a, -z);
        prop_assert_eq!(b, x);
        prop_assert_eq!(c, -y);
        // magnitude is preserved
        prop_assert!(((a * a + b * b + c * c) - (x * x + y * y + z * z)).abs() <= 1e-3 * (1.0 + x * x + y * y + z * z));
    }

    #[test]
    fn prop_edges_offset_per_person(n in 0usize..12) {
        let edges = skeleton_edges(n);
        prop_assert_eq!(edges.len(), n * SKELETON_EDGES.len());
        prop_assert!(edges.iter().flatten().all(|&i| i < 19 * n));
        for (i, edge) in edges.iter().enumerate() {
            let person = i / SKELETON_EDGES.len();
            let template = SKELETON_EDGES[i % SKELETON_EDGES.len()];
            prop_assert_eq!(*edge, [template[0] + 19 * person, template[1] + 19 * person]);
        }
    }

    #[test]
    fn prop_rotation_round_trip(
        roll in angle(), pitch in angle(), yaw in angle(),
        tx in coordinate(), ty in coordinate(), tz in coordinate(),
        x in coordinate(), y in coordinate(), z in coordinate(),
    ) {
        let rotation = Rotation3::from_euler_angles(roll, pitch, yaw).into_inner();
        let extrinsics = Extrinsics::new(rotation, Vector3::new(tx, ty, tz)).unwrap();
        let p = Vector3::new(x, y, z);
        let back = extrinsics.world_to_camera(&extrinsics.camera_to_world(&p));
        prop_assert!((back - p).norm() < 1e-2);
    }

    #[test]
    fn prop_confidence_untouched(conf in 0.0f32..1.0, x in coordinate()) {
        let transformer = CoordinateTransformer::new(Extrinsics::identity());
        let mut poses = Array2::<f32>::from_elem((1, POSE_3D_VALUES), x);
        for kpt in 0..19 {
            poses[[0, kpt * 4 + 3]] = conf;
        }
        let rotated = transformer.rotate_poses(&poses).unwrap();
        for kpt in 0..19 {
            prop_assert_eq!(rotated[[0, kpt * 4 + 3]], conf);
        }
    }
}

#[test]
fn test_empty_poses_give_empty_scene() {
    let transformer = CoordinateTransformer::new(Extrinsics::identity());
    let scene = transformer.build_scene(&Array2::zeros((0, POSE_3D_VALUES))).unwrap();
    assert_eq!(scene.num_poses(), 0);
    assert!(scene.edges.is_empty());
}

#[test]
fn test_vertex_shape() {
    let transformer = CoordinateTransformer::new(Extrinsics::identity());
    let scene = transformer.build_scene(&Array2::ones((3, POSE_3D_VALUES))).unwrap();
    assert_eq!(scene.vertices.shape(), &[3, 19, 3]);
    assert_eq!(scene.edges.len(), 51);
}
