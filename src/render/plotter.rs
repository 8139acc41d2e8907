//! 3D skeleton canvas with a mouse-driven orbit camera.

use crate::{transform::Scene3d, utils::to_pixel, Result};
use log::debug;
use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    highgui, imgproc,
    prelude::*,
};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_6, PI};
use std::sync::{Arc, Mutex};

const AXIS_LENGTH: f32 = 200.0;
const GRID_STEP: usize = 20;

/// Pixels of horizontal drag for one full turn
const DRAG_SCALE_X: f32 = 800.0;
/// Pixels of vertical drag for two full turns
const DRAG_SCALE_Y: f32 = 800.0;

/// Orbit camera angles and drag state
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub theta: f32,
    pub phi: f32,
    drag_from: Option<(i32, i32)>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            theta: FRAC_PI_4,
            phi: -FRAC_PI_6,
            drag_from: None,
        }
    }
}

impl OrbitCamera {
    /// Start a drag at (x, y)
    pub fn press(&mut self, x: i32, y: i32) {
        self.drag_from = Some((x, y));
    }

    pub fn release(&mut self) {
        self.drag_from = None;
    }

    /// Rotate by the motion since the last drag position; no-op when not
    /// dragging
    #[allow(clippy::cast_precision_loss)]
    pub fn drag_to(&mut self, x: i32, y: i32) {
        let Some((px, py)) = self.drag_from else {
            return;
        };
        self.theta += (x - px) as f32 / DRAG_SCALE_X * 2.0 * PI;
        self.phi -= (y - py) as f32 / DRAG_SCALE_Y * 4.0 * PI;
        self.phi = self.phi.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.drag_from = Some((x, y));
    }

    /// Dispatch a highgui mouse event
    pub fn on_mouse(&mut self, event: i32, x: i32, y: i32) {
        match event {
            highgui::EVENT_LBUTTONDOWN => self.press(x, y),
            highgui::EVENT_MOUSEMOVE => self.drag_to(x, y),
            highgui::EVENT_LBUTTONUP => self.release(),
            _ => {}
        }
    }

    /// Project a 3D point onto the view plane, relative to the origin
    #[must_use]
    pub fn project(&self, p: [f32; 3]) -> [f32; 2] {
        let (st, ct) = self.theta.sin_cos();
        let (sp, cp) = self.phi.sin_cos();
        [p[0] * ct - p[1] * st, p[0] * st * sp + p[1] * ct * sp - p[2] * cp]
    }
}

/// Draws scenes onto a fixed-size canvas
pub struct Plotter3d {
    width: i32,
    height: i32,
    origin: [f32; 2],
    scale: f32,
    camera: Arc<Mutex<OrbitCamera>>,
    axes: Vec<[[f32; 3]; 2]>,
}

#[allow(clippy::cast_precision_loss)]
fn axes_and_grid() -> Vec<[[f32; 3]; 2]> {
    let half = AXIS_LENGTH / 2.0;
    let mut axes = vec![
        [[-half, -half, 0.0], [half, -half, 0.0]],
        [[-half, -half, 0.0], [-half, half, 0.0]],
        [[-half, -half, 0.0], [-half, -half, AXIS_LENGTH]],
    ];
    for step in (0..=AXIS_LENGTH as usize).step_by(GRID_STEP) {
        let offset = -half + step as f32;
        axes.push([[-half, offset, 0.0], [half, offset, 0.0]]);
        axes.push([[offset, -half, 0.0], [offset, half, 0.0]]);
    }
    axes
}

impl Plotter3d {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            origin: [width as f32 / 2.0, height as f32 / 2.0],
            scale: 1.0,
            camera: Arc::new(Mutex::new(OrbitCamera::default())),
            axes: axes_and_grid(),
        }
    }

    /// Camera shared with the mouse callback
    #[must_use]
    pub fn camera(&self) -> Arc<Mutex<OrbitCamera>> {
        Arc::clone(&self.camera)
    }

    /// Register the orbit camera as the mouse handler of `window`
    pub fn attach(&self, window: &str) -> Result<()> {
        let camera = self.camera();
        highgui::set_mouse_callback(
            window,
            Some(Box::new(move |event, x, y, _flags| {
                if let Ok(mut camera) = camera.lock() {
                    camera.on_mouse(event, x, y);
                }
            })),
        )?;
        debug!("Orbit camera attached to window {}", window);
        Ok(())
    }

    /// A black canvas of the plotter's size
    pub fn blank_canvas(&self) -> Result<Mat> {
        Ok(Mat::zeros(self.height, self.width, CV_8UC3)?.to_mat()?)
    }

    fn to_canvas(&self, p: [f32; 2]) -> opencv::core::Point {
        to_pixel(p[0] * self.scale + self.origin[0], p[1] * self.scale + self.origin[1])
    }

    fn snapshot(&self) -> OrbitCamera {
        match self.camera.lock() {
            Ok(camera) => camera.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Clear `canvas` and draw the grid, axes and every edge of `scene`
    pub fn plot(&self, canvas: &mut Mat, scene: &Scene3d) -> Result<()> {
        *canvas = self.blank_canvas()?;
        let camera = self.snapshot();

        let gray = Scalar::new(128.0, 128.0, 128.0, 0.0);
        for [a, b] in &self.axes {
            let pa = self.to_canvas(camera.project(*a));
            let pb = self.to_canvas(camera.project(*b));
            imgproc::line(canvas, pa, pb, gray, 1, imgproc::LINE_AA, 0)?;
        }

        let white = Scalar::new(255.0, 255.0, 255.0, 0.0);
        for &[a, b] in &scene.edges {
            let (Some(va), Some(vb)) = (scene.vertex(a), scene.vertex(b)) else {
                continue;
            };
            let pa = self.to_canvas(camera.project(va));
            let pb = self.to_canvas(camera.project(vb));
            imgproc::line(canvas, pa, pb, white, 1, imgproc::LINE_AA, 0)?;
        }
        Ok(())
    }
}
