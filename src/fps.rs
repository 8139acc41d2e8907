//! Frame rate readout smoothed with an exponential moving average.

use crate::constants::FPS_SMOOTHING;
use std::time::{Duration, Instant};

/// Exponentially smoothed frame-time meter
#[derive(Debug, Clone)]
pub struct FpsMeter {
    alpha: f64,
    mean_frame_time: Option<f64>,
    started: Option<Instant>,
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(FPS_SMOOTHING)
    }
}

impl FpsMeter {
    /// `alpha` is the weight of a new sample, in (0, 1]
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha > 0.0 && alpha <= 1.0 { alpha } else { FPS_SMOOTHING };
        Self {
            alpha,
            mean_frame_time: None,
            started: None,
        }
    }

    /// Mark the start of a frame
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Close the frame started by [`FpsMeter::start`]
    pub fn stop(&mut self) -> Option<f64> {
        let started = self.started.take()?;
        Some(self.record(started.elapsed()))
    }

    /// Add one frame time and return the new mean in seconds
    pub fn record(&mut self, frame_time: Duration) -> f64 {
        let sample = frame_time.as_secs_f64();
        let mean = match self.mean_frame_time {
            Some(last) => (1.0 - self.alpha) * last + self.alpha * sample,
            None => sample,
        };
        self.mean_frame_time = Some(mean);
        mean
    }

    /// Smoothed frame time in seconds
    #[must_use]
    pub fn mean_frame_time(&self) -> Option<f64> {
        self.mean_frame_time
    }

    /// Frames per second truncated to one decimal
    #[must_use]
    pub fn fps(&self) -> Option<f64> {
        self.mean_frame_time
            .filter(|&mean| mean > 0.0)
            .map(|mean| (10.0 / mean).floor() / 10.0)
    }
}
