//! Scene renderer: the interactive 3D canvas and the 2D frame overlay.

pub mod overlay;
pub mod plotter;

pub use overlay::{draw_fps, draw_poses, BODY_EDGES};
pub use plotter::{OrbitCamera, Plotter3d};
