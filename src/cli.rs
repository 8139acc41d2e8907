//! Command-line arguments and their resolution into an application config.

use crate::{
    app::{AppConfig, InputMode},
    config::Config,
    source::VideoSource,
    Result,
};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time monocular 3D human pose estimation", long_about = None)]
pub struct Args {
    /// Input image
    #[arg(short, long, default_value = "input.png")]
    pub input: PathBuf,

    /// Video file, or camera index (0 for the default webcam)
    #[arg(short, long)]
    pub video: Option<String>,

    /// Allow rotating the 3D canvas while paused
    #[arg(long = "rotate3d")]
    pub rotate3d: bool,

    /// Output path for the annotated image
    #[arg(short, long, default_value = "output.png")]
    pub savepath: PathBuf,

    /// ONNX pose model, overrides the configuration file
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Camera extrinsics JSON, overrides the configuration file
    #[arg(short, long)]
    pub extrinsics: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    /// Log filter matching `--debug`
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    /// Load the configuration file if given, apply overrides and validate
    pub fn load_settings(&self) -> Result<Config> {
        let mut settings = match &self.config {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                match Config::from_file(path) {
                    Ok(cfg) => cfg,
                    Err(e) => {
                        warn!("Failed to load config file: {}. Using defaults.", e);
                        Config::default()
                    }
                }
            }
            None => Config::default(),
        };

        if let Some(model) = &self.model {
            settings.models.pose_model = model.clone();
        }
        if let Some(extrinsics) = &self.extrinsics {
            settings.models.extrinsics = extrinsics.clone();
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Build the application configuration
    pub fn into_app_config(self) -> Result<AppConfig> {
        let settings = self.load_settings()?;
        let input = match &self.video {
            Some(video) => InputMode::Video(VideoSource::parse(video)),
            None => InputMode::Images(vec![self.input.clone()]),
        };
        Ok(AppConfig {
            input,
            rotate_3d: self.rotate3d,
            save_path: self.savepath,
            settings,
        })
    }
}
