//! Main application module for 3D human pose estimation.

use crate::{
    calibration::Extrinsics,
    config::Config,
    decoder::{DecodeParams, DecodedPoses, HeatmapDecoder, PoseDecoder},
    error::Result,
    fps::FpsMeter,
    inference::{InferenceEngine, InferenceOutput, OnnxEngine},
    playback::{FrameHandler, HighGuiKeys, PlaybackController},
    preprocessing::Preprocessor,
    render::{draw_fps, draw_poses, Plotter3d},
    source::{FrameSource, ImageReader, VideoReader, VideoSource},
    transform::{CoordinateTransformer, Scene3d},
    Error,
};
use log::{debug, info};
use ndarray::Array4;
use opencv::{
    core::{Mat, Vector},
    highgui::{self, WINDOW_NORMAL},
    imgcodecs,
    prelude::*,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where frames come from
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    /// Camera or video file, shown interactively
    Video(VideoSource),
    /// Still images, processed once each and written to disk
    Images(Vec<PathBuf>),
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Frame input
    pub input: InputMode,
    /// Keep the 3D canvas interactive while paused
    pub rotate_3d: bool,
    /// Annotated frame output path in image mode
    pub save_path: PathBuf,
    /// Tunables, with model and calibration paths already resolved
    pub settings: Config,
}

/// What happens to a processed frame and its canvas
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// Show both in highgui windows
    Windows { canvas: String, frame: String },
    /// Write `Canvas3D_<n>.png` next to `save_path`, and the frame to
    /// `save_path`
    Files { save_path: PathBuf },
    /// Keep results in memory only
    Headless,
}

/// Canvas file written for frame `index` in image mode
#[must_use]
pub fn canvas_path(save_path: &Path, index: usize) -> PathBuf {
    save_path.with_file_name(format!("Canvas3D_{index}.png"))
}

/// Per-run pipeline state
pub struct PoseSession<E, D> {
    preprocessor: Preprocessor,
    engine: E,
    decoder: D,
    transformer: CoordinateTransformer,
    plotter: Plotter3d,
    fps: FpsMeter,
    canvas: Mat,
    scene: Scene3d,
    poses: DecodedPoses,
    focal_length: Option<f32>,
    focal_length_factor: f32,
    frame_index: usize,
    inference_runs: usize,
    is_video: bool,
    presentation: Presentation,
}

impl<E: InferenceEngine, D: PoseDecoder> PoseSession<E, D> {
    /// Create a session; image sessions repeat inference `warmup_runs` times
    pub fn new(
        engine: E,
        decoder: D,
        transformer: CoordinateTransformer,
        settings: &Config,
        presentation: Presentation,
        is_video: bool,
    ) -> Result<Self> {
        let plotter = Plotter3d::new(settings.display.canvas_width, settings.display.canvas_height);
        let canvas = plotter.blank_canvas()?;
        Ok(Self {
            preprocessor: Preprocessor::new(settings.inference.input_height, settings.inference.stride)?,
            engine,
            decoder,
            transformer,
            plotter,
            fps: FpsMeter::new(settings.display.fps_smoothing),
            canvas,
            scene: Scene3d::empty(),
            poses: DecodedPoses::empty(),
            focal_length: None,
            focal_length_factor: settings.inference.focal_length_factor,
            frame_index: 0,
            inference_runs: if is_video { 1 } else { settings.inference.warmup_runs.max(1) },
            is_video,
            presentation,
        })
    }

    /// Register the orbit camera on the canvas window
    pub fn attach_mouse(&self) -> Result<()> {
        if let Presentation::Windows { canvas, .. } = &self.presentation {
            self.plotter.attach(canvas)?;
        }
        Ok(())
    }

    fn infer(&mut self, tensor: &Array4<f32>) -> Result<InferenceOutput> {
        let mut output = None;
        for run in 0..self.inference_runs {
            let started = Instant::now();
            output = Some(self.engine.run(tensor)?);
            let elapsed = started.elapsed().as_secs_f64() * 1000.0;
            if self.is_video {
                debug!("Inference took {:.1} ms", elapsed);
            } else {
                info!("Inference run {} took {:.1} ms", run + 1, elapsed);
            }
        }
        output.ok_or_else(|| Error::ModelError("Inference was not run".to_string()))
    }

    /// Run the pipeline on one frame, drawing the 2D overlay onto it and
    /// the scene onto the canvas
    #[allow(clippy::cast_precision_loss)]
    pub fn process(&mut self, frame: &mut Mat) -> Result<&DecodedPoses> {
        let prepared = self.preprocessor.prepare(frame)?;
        if let Some(shape) = prepared.configure_shape {
            self.engine.configure(shape)?;
        }
        let focal_length = *self
            .focal_length
            .get_or_insert(self.focal_length_factor * frame.cols() as f32);

        let output = self.infer(&prepared.tensor)?;
        let params = DecodeParams {
            input_scale: prepared.input_scale,
            stride: self.preprocessor.stride(),
            focal_length,
            is_video: self.is_video,
        };
        self.poses = self.decoder.decode(&output, &params)?;
        debug!("Frame {}: {} poses", self.frame_index, self.poses.len());

        self.scene = self.transformer.build_scene(&self.poses.poses_3d)?;
        self.plotter.plot(&mut self.canvas, &self.scene)?;
        draw_poses(frame, &self.poses.poses_2d)?;
        Ok(&self.poses)
    }

    fn present_canvas(&self) -> Result<()> {
        match &self.presentation {
            Presentation::Windows { canvas, .. } => highgui::imshow(canvas, &self.canvas)?,
            Presentation::Files { save_path } => {
                let canvas_file = canvas_path(save_path, self.frame_index);
                write_image(&canvas_file, &self.canvas)?;
                info!("Saved {}", canvas_file.display());
            }
            Presentation::Headless => {}
        }
        Ok(())
    }

    fn present_frame(&self, frame: &Mat) -> Result<()> {
        match &self.presentation {
            Presentation::Windows { frame: window, .. } => highgui::imshow(window, frame)?,
            Presentation::Files { save_path } => {
                write_image(save_path, frame)?;
                info!("Saved {}", save_path.display());
            }
            Presentation::Headless => {}
        }
        Ok(())
    }

    /// The scene of the last processed frame
    #[must_use]
    pub fn scene(&self) -> &Scene3d {
        &self.scene
    }

    /// The poses of the last processed frame
    #[must_use]
    pub fn poses(&self) -> &DecodedPoses {
        &self.poses
    }

    /// The 3D canvas
    #[must_use]
    pub fn canvas(&self) -> &Mat {
        &self.canvas
    }

    /// Focal length fixed by the first frame
    #[must_use]
    pub fn focal_length(&self) -> Option<f32> {
        self.focal_length
    }

    /// Number of frames handled so far
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[must_use]
    pub fn fps(&self) -> &FpsMeter {
        &self.fps
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

fn write_image(path: &Path, image: &Mat) -> Result<()> {
    if !imgcodecs::imwrite(&path.to_string_lossy(), image, &Vector::new())? {
        return Err(Error::IoError(format!("Cannot write {}", path.display())));
    }
    Ok(())
}

impl<E: InferenceEngine, D: PoseDecoder> FrameHandler<Mat> for PoseSession<E, D> {
    fn handle_frame(&mut self, mut frame: Mat) -> Result<()> {
        self.fps.start();
        self.process(&mut frame)?;
        self.present_canvas()?;
        self.fps.stop();
        if let Some(fps) = self.fps.fps() {
            draw_fps(&mut frame, fps)?;
        }
        self.present_frame(&frame)?;
        self.frame_index += 1;
        Ok(())
    }

    fn redraw_scene(&mut self) -> Result<()> {
        self.plotter.plot(&mut self.canvas, &self.scene)?;
        if let Presentation::Windows { canvas, .. } = &self.presentation {
            highgui::imshow(canvas, &self.canvas)?;
        }
        Ok(())
    }
}

/// Main application
pub struct PoseApp {
    config: AppConfig,
}

impl PoseApp {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Load calibration and model, then run the selected input mode
    pub fn run(self) -> Result<()> {
        info!("Initializing 3D Human Pose Estimation application");
        let settings = &self.config.settings;

        let extrinsics = Extrinsics::from_file(&settings.models.extrinsics)?;
        let transformer = CoordinateTransformer::new(extrinsics);
        settings.check_files()?;
        let engine = OnnxEngine::new(&settings.models.pose_model)?;
        let decoder = HeatmapDecoder::new(settings.decoder.clone(), settings.tracking.clone());

        match &self.config.input {
            InputMode::Video(source) => {
                let mut reader = VideoReader::open(source.clone())?;
                let canvas = settings.display.canvas_window.clone();
                let frame = settings.display.frame_window.clone();
                highgui::named_window(&canvas, WINDOW_NORMAL)?;
                highgui::named_window(&frame, WINDOW_NORMAL)?;

                let mut session = PoseSession::new(
                    engine,
                    decoder,
                    transformer,
                    settings,
                    Presentation::Windows { canvas, frame },
                    true,
                )?;
                session.attach_mouse()?;

                let summary = PlaybackController::new(self.config.rotate_3d)
                    .with_rotate_poll(settings.display.rotate_poll_ms)
                    .run(&mut reader, &mut HighGuiKeys, &mut session)?;
                info!("Processed {} frames ({:?})", summary.frames, summary.reason);
                highgui::destroy_all_windows()?;
            }
            InputMode::Images(paths) => {
                let mut reader = ImageReader::new(paths.clone());
                let mut session = PoseSession::new(
                    engine,
                    decoder,
                    transformer,
                    settings,
                    Presentation::Files {
                        save_path: self.config.save_path.clone(),
                    },
                    false,
                )?;
                while let Some(frame) = reader.next_frame()? {
                    session.handle_frame(frame)?;
                }
                info!("Processed {} images", session.frame_index());
            }
        }

        info!("Application shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_path_next_to_output() {
        assert_eq!(canvas_path(Path::new("output.png"), 0), PathBuf::from("Canvas3D_0.png"));
        assert_eq!(
            canvas_path(Path::new("/tmp/results/out.png"), 3),
            PathBuf::from("/tmp/results/Canvas3D_3.png")
        );
    }
}
