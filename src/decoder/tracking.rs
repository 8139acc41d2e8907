//! Frame-to-frame pose identity and translation smoothing for video input.

use crate::config::TrackingConfig;
use crate::constants::{MISSING_KEYPOINT, NUM_KEYPOINTS, POSE_2D_STRIDE, POSE_2D_VALUES};
use log::debug;

/// Per-keypoint spread used by the similarity score, Panoptic order
const KEYPOINT_SIGMAS: [f32; NUM_KEYPOINTS] = [
    0.079, 0.026, 0.107, 0.079, 0.072, 0.062, 0.107, 0.087, 0.089, 0.079, 0.072, 0.062, 0.107, 0.087, 0.089, 0.025,
    0.025, 0.035, 0.035,
];

/// Keypoints that must agree before a pose inherits a previous identity
const MIN_SIMILAR_KEYPOINTS: usize = 3;

/// Low-pass filter component
#[derive(Debug, Clone, Default)]
struct LowPassFilter {
    prev: Option<f32>,
}

impl LowPassFilter {
    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        let result = match self.prev {
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        self.prev = Some(result);
        result
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

/// One Euro filter for a scalar sampled at a fixed frequency
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    period: f32,
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    prev_value: Option<f32>,
}

impl OneEuroFilter {
    #[must_use]
    pub fn new(frequency: f32, min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            period: 1.0 / frequency,
            min_cutoff,
            beta,
            d_cutoff,
            x_filter: LowPassFilter::default(),
            dx_filter: LowPassFilter::default(),
            prev_value: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.filter_frequency, config.min_cutoff, config.beta, config.d_cutoff)
    }

    pub fn filter(&mut self, value: f32) -> f32 {
        let dx = self.prev_value.map_or(0.0, |prev| (value - prev) / self.period);
        self.prev_value = Some(value);

        let edx = self.dx_filter.filter(dx, smoothing_factor(self.period, self.d_cutoff));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        self.x_filter.filter(value, smoothing_factor(self.period, cutoff))
    }
}

/// Translation filter of one tracked person
#[derive(Debug, Clone)]
struct TranslationFilter([OneEuroFilter; 3]);

impl TranslationFilter {
    fn new(config: &TrackingConfig) -> Self {
        Self(std::array::from_fn(|_| OneEuroFilter::from_config(config)))
    }

    fn apply(&mut self, t: [f32; 3]) -> [f32; 3] {
        [self.0[0].filter(t[0]), self.0[1].filter(t[1]), self.0[2].filter(t[2])]
    }
}

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    keypoints: [Option<[f32; 2]>; NUM_KEYPOINTS],
    area: f32,
    filter: TranslationFilter,
}

fn keypoints_of(pose_2d: &[f32; POSE_2D_VALUES]) -> [Option<[f32; 2]>; NUM_KEYPOINTS] {
    std::array::from_fn(|kpt| {
        let base = kpt * POSE_2D_STRIDE;
        (pose_2d[base + 2] != MISSING_KEYPOINT).then(|| [pose_2d[base], pose_2d[base + 1]])
    })
}

fn bbox_area(keypoints: &[Option<[f32; 2]>; NUM_KEYPOINTS]) -> f32 {
    let found: Vec<[f32; 2]> = keypoints.iter().flatten().copied().collect();
    if found.is_empty() {
        return 0.0;
    }
    let (min_x, max_x) = found.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    let (min_y, max_y) = found.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p[1]), hi.max(p[1])));
    (max_x - min_x + 1.0) * (max_y - min_y + 1.0)
}

/// Count of keypoints whose object-keypoint similarity exceeds `threshold`
fn similar_keypoints(
    a: &[Option<[f32; 2]>; NUM_KEYPOINTS],
    b: &[Option<[f32; 2]>; NUM_KEYPOINTS],
    area: f32,
    threshold: f32,
) -> usize {
    a.iter()
        .zip(b.iter())
        .zip(KEYPOINT_SIGMAS.iter())
        .filter(|((ka, kb), sigma)| match (ka, kb) {
            (Some(pa), Some(pb)) => {
                let distance = (pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2);
                let variance = (**sigma * 2.0).powi(2);
                (-distance / (2.0 * (area + f32::EPSILON) * variance)).exp() > threshold
            }
            _ => false,
        })
        .count()
}

/// Carries person identities and translation filters between frames
#[derive(Debug, Clone)]
pub struct PoseTracker {
    config: TrackingConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl PoseTracker {
    #[must_use]
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Match the current frame's 2D poses against the previous frame and
    /// return one identity per pose, in input order
    pub fn update(&mut self, poses_2d: &[[f32; POSE_2D_VALUES]]) -> Vec<u64> {
        let mut order: Vec<usize> = (0..poses_2d.len()).collect();
        order.sort_by(|&a, &b| {
            poses_2d[b][POSE_2D_VALUES - 1]
                .partial_cmp(&poses_2d[a][POSE_2D_VALUES - 1])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut previous: Vec<Option<Track>> = std::mem::take(&mut self.tracks).into_iter().map(Some).collect();
        let mut current: Vec<Option<Track>> = vec![None; poses_2d.len()];

        for idx in order {
            let keypoints = keypoints_of(&poses_2d[idx]);
            let area = bbox_area(&keypoints);

            let best = previous
                .iter()
                .enumerate()
                .filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
                .map(|(i, t)| {
                    (i, similar_keypoints(&keypoints, &t.keypoints, area.max(t.area), self.config.similarity_threshold))
                })
                .max_by_key(|&(_, count)| count)
                .filter(|&(_, count)| count >= MIN_SIMILAR_KEYPOINTS);

            let track = match best.and_then(|(i, _)| previous[i].take()) {
                Some(prev) => Track {
                    keypoints,
                    area,
                    ..prev
                },
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!("New pose track {}", id);
                    Track {
                        id,
                        keypoints,
                        area,
                        filter: TranslationFilter::new(&self.config),
                    }
                }
            };
            current[idx] = Some(track);
        }

        self.tracks = current.into_iter().flatten().collect();
        self.tracks.iter().map(|t| t.id).collect()
    }

    /// Smooth a translation with the filter of track `id`
    pub fn smooth_translation(&mut self, id: u64, translation: [f32; 3]) -> [f32; 3] {
        match self.tracks.iter_mut().find(|t| t.id == id) {
            Some(track) => track.filter.apply(translation),
            None => translation,
        }
    }

    /// Number of people tracked in the last frame
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
