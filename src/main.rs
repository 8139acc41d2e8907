//! Real-time monocular 3D human pose estimation from a camera, video or image.

use anyhow::Result;
use clap::Parser;
use human_pose_3d::{app::PoseApp, cli::Args};
use log::info;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(args.log_filter()));

    info!("3D Human Pose Estimation");

    let config = args.into_app_config()?;
    PoseApp::new(config).run()?;

    Ok(())
}
