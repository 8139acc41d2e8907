//! Heatmap peak extraction and PAF-scored limb grouping over the 18 COCO
//! body keypoints.

use crate::config::DecoderConfig;
use ndarray::{ArrayView2, ArrayView3, Axis};
use std::cmp::Ordering;

/// Number of body keypoints found on the heatmaps
pub const NUM_BODY_KEYPOINTS: usize = 18;

/// Keypoint pairs joined by each limb, in grouping order
pub const BODY_PARTS_KPT_IDS: [[usize; 2]; 19] = [
    [1, 2],
    [1, 5],
    [2, 3],
    [3, 4],
    [5, 6],
    [6, 7],
    [1, 8],
    [8, 9],
    [9, 10],
    [1, 11],
    [11, 12],
    [12, 13],
    [1, 0],
    [0, 14],
    [14, 16],
    [0, 15],
    [15, 17],
    [2, 16],
    [5, 17],
];

/// PAF channels (x, y) for each limb of [`BODY_PARTS_KPT_IDS`]
pub const BODY_PARTS_PAF_IDS: [[usize; 2]; 19] = [
    [12, 13],
    [20, 21],
    [14, 15],
    [16, 17],
    [22, 23],
    [24, 25],
    [0, 1],
    [2, 3],
    [4, 5],
    [6, 7],
    [8, 9],
    [10, 11],
    [28, 29],
    [30, 31],
    [34, 35],
    [32, 33],
    [36, 37],
    [18, 19],
    [26, 27],
];

/// Limbs from this index on only attach keypoints to existing poses
const REDUNDANT_LIMBS_START: usize = 17;

const POINTS_PER_LIMB: usize = 10;

/// A heatmap peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: f32,
    pub y: f32,
    pub score: f32,
    /// Index into the flattened list of all peaks of all keypoint types
    pub id: usize,
}

/// A grouped person at feature-map resolution
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPose {
    /// Keypoints in COCO order, `None` when not found
    pub keypoints: [Option<Peak>; NUM_BODY_KEYPOINTS],
    /// Sum of keypoint and connection scores
    pub score: f32,
    /// Number of keypoints found
    pub count: usize,
}

/// Find local maxima above `threshold` on one heatmap, then suppress
/// peaks closer than `nms_radius` to a peak already kept (scan order by x)
#[allow(clippy::cast_precision_loss)]
pub fn extract_peaks(heatmap: ArrayView2<f32>, threshold: f32, nms_radius: f32, first_id: usize) -> Vec<Peak> {
    let (height, width) = heatmap.dim();
    let at = |y: isize, x: isize| -> f32 {
        if y < 0 || x < 0 || y >= height as isize || x >= width as isize {
            0.0
        } else {
            heatmap[[y as usize, x as usize]]
        }
    };

    let mut candidates = Vec::new();
    for ((y, x), &value) in heatmap.indexed_iter() {
        if value <= threshold {
            continue;
        }
        let (yi, xi) = (y as isize, x as isize);
        if value > at(yi, xi - 1) && value > at(yi, xi + 1) && value > at(yi - 1, xi) && value > at(yi + 1, xi) {
            candidates.push((x as f32, y as f32, value));
        }
    }
    candidates.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    });

    let mut suppressed = vec![false; candidates.len()];
    let mut peaks = Vec::new();
    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        let (x, y, score) = candidates[i];
        for j in (i + 1)..candidates.len() {
            let (xj, yj, _) = candidates[j];
            if ((x - xj).powi(2) + (y - yj).powi(2)).sqrt() < nms_radius {
                suppressed[j] = true;
            }
        }
        peaks.push(Peak {
            x,
            y,
            score,
            id: first_id + peaks.len(),
        });
    }
    peaks
}

/// Extract peaks for every body keypoint channel
pub fn extract_all_peaks(heatmaps: ArrayView3<f32>, config: &DecoderConfig) -> Vec<Vec<Peak>> {
    let mut total = 0;
    heatmaps
        .axis_iter(Axis(0))
        .take(NUM_BODY_KEYPOINTS)
        .map(|channel| {
            let peaks = extract_peaks(channel, config.peak_threshold, config.nms_radius, total);
            total += peaks.len();
            peaks
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    a: Peak,
    b: Peak,
    score: f32,
}

/// Mean PAF projection along the segment a→b, or `None` when too few
/// sampled points pass `min_paf_score`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn limb_score(
    a: &Peak,
    b: &Peak,
    paf_x: ArrayView2<f32>,
    paf_y: ArrayView2<f32>,
    config: &DecoderConfig,
) -> Option<f32> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let norm = (dx * dx + dy * dy).sqrt();
    if norm < f32::EPSILON {
        return None;
    }
    let (ux, uy) = (dx / norm, dy / norm);
    let (height, width) = paf_x.dim();

    let mut passed = 0usize;
    let mut total = 0.0;
    for step in 0..POINTS_PER_LIMB {
        let t = step as f32 / (POINTS_PER_LIMB - 1) as f32;
        let x = (a.x + dx * t).round().clamp(0.0, (width - 1) as f32) as usize;
        let y = (a.y + dy * t).round().clamp(0.0, (height - 1) as f32) as usize;
        let score = paf_x[[y, x]] * ux + paf_y[[y, x]] * uy;
        if score > config.min_paf_score {
            passed += 1;
            total += score;
        }
    }

    let ratio = passed as f32 / POINTS_PER_LIMB as f32;
    if passed == 0 || ratio <= config.min_paf_ratio {
        return None;
    }
    Some(total / passed as f32)
}

/// Best unique connections between two keypoint candidate sets
fn connect(
    kpts_a: &[Peak],
    kpts_b: &[Peak],
    paf_x: ArrayView2<f32>,
    paf_y: ArrayView2<f32>,
    config: &DecoderConfig,
) -> Vec<Connection> {
    let mut candidates = Vec::new();
    for a in kpts_a {
        for b in kpts_b {
            if let Some(score) = limb_score(a, b, paf_x, paf_y, config) {
                candidates.push(Connection { a: *a, b: *b, score });
            }
        }
    }
    candidates.sort_by(|l, r| r.score.partial_cmp(&l.score).unwrap_or(Ordering::Equal));

    let mut used_a = Vec::new();
    let mut used_b = Vec::new();
    let mut connections = Vec::new();
    for c in candidates {
        if used_a.contains(&c.a.id) || used_b.contains(&c.b.id) {
            continue;
        }
        used_a.push(c.a.id);
        used_b.push(c.b.id);
        connections.push(c);
        if connections.len() >= kpts_a.len().min(kpts_b.len()) {
            break;
        }
    }
    connections
}

fn slot_holds(pose: &BodyPose, kpt: usize, id: usize) -> bool {
    pose.keypoints[kpt].is_some_and(|p| p.id == id)
}

fn single_keypoint_poses(poses: &mut Vec<BodyPose>, peaks: &[Peak], kpt: usize) {
    for peak in peaks {
        if poses.iter().any(|p| slot_holds(p, kpt, peak.id)) {
            continue;
        }
        let mut keypoints = [None; NUM_BODY_KEYPOINTS];
        keypoints[kpt] = Some(*peak);
        poses.push(BodyPose {
            keypoints,
            score: peak.score,
            count: 1,
        });
    }
}

/// Assemble people from per-keypoint peaks and part affinity fields
#[allow(clippy::cast_precision_loss)]
pub fn group_keypoints(peaks: &[Vec<Peak>], pafs: ArrayView3<f32>, config: &DecoderConfig) -> Vec<BodyPose> {
    let mut poses: Vec<BodyPose> = Vec::new();
    let empty = Vec::new();

    let limbs = BODY_PARTS_KPT_IDS.iter().zip(BODY_PARTS_PAF_IDS.iter());
    for (part, (&[kpt_a, kpt_b], &[paf_a, paf_b])) in limbs.enumerate() {
        let kpts_a = peaks.get(kpt_a).unwrap_or(&empty);
        let kpts_b = peaks.get(kpt_b).unwrap_or(&empty);

        match (kpts_a.is_empty(), kpts_b.is_empty()) {
            (true, true) => continue,
            (true, false) => {
                single_keypoint_poses(&mut poses, kpts_b, kpt_b);
                continue;
            }
            (false, true) => {
                single_keypoint_poses(&mut poses, kpts_a, kpt_a);
                continue;
            }
            (false, false) => {}
        }

        let connections = connect(
            kpts_a,
            kpts_b,
            pafs.index_axis(Axis(0), paf_a),
            pafs.index_axis(Axis(0), paf_b),
            config,
        );

        if part >= REDUNDANT_LIMBS_START {
            for c in &connections {
                for pose in &mut poses {
                    if slot_holds(pose, kpt_a, c.a.id) && pose.keypoints[kpt_b].is_none() {
                        pose.keypoints[kpt_b] = Some(c.b);
                    } else if slot_holds(pose, kpt_b, c.b.id) && pose.keypoints[kpt_a].is_none() {
                        pose.keypoints[kpt_a] = Some(c.a);
                    }
                }
            }
            continue;
        }

        for c in &connections {
            let mut attached = false;
            for pose in &mut poses {
                if slot_holds(pose, kpt_a, c.a.id) {
                    pose.keypoints[kpt_b] = Some(c.b);
                    pose.count += 1;
                    pose.score += c.b.score + c.score;
                    attached = true;
                }
            }
            if !attached {
                let mut keypoints = [None; NUM_BODY_KEYPOINTS];
                keypoints[kpt_a] = Some(c.a);
                keypoints[kpt_b] = Some(c.b);
                poses.push(BodyPose {
                    keypoints,
                    score: c.a.score + c.b.score + c.score,
                    count: 2,
                });
            }
        }
    }

    poses.retain(|p| p.count >= config.min_pose_keypoints && p.score / p.count as f32 >= config.min_pose_score);
    poses
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_extract_single_peak() {
        let mut map = Array2::<f32>::zeros((8, 8));
        map[[3, 4]] = 0.9;
        map[[3, 5]] = 0.5;
        let peaks = extract_peaks(map.view(), 0.1, 6.0, 0);
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].x, peaks[0].y), (4.0, 3.0));
    }

    #[test]
    fn test_nms_keeps_distant_peaks() {
        let mut map = Array2::<f32>::zeros((10, 20));
        map[[2, 1]] = 0.8;
        map[[2, 4]] = 0.7;
        map[[2, 15]] = 0.6;
        let peaks = extract_peaks(map.view(), 0.1, 6.0, 10);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].id, 10);
        assert_eq!(peaks[1].x, 15.0);
    }

    #[test]
    fn test_below_threshold_ignored() {
        let mut map = Array2::<f32>::zeros((4, 4));
        map[[1, 1]] = 0.05;
        assert!(extract_peaks(map.view(), 0.1, 6.0, 0).is_empty());
    }

    #[test]
    fn test_group_connected_limb() {
        let config = DecoderConfig::default();
        // neck (1) at (2,2), right shoulder (2) at (8,2), right elbow (3) at (14,2)
        let peak = |x: f32, id| Peak { x, y: 2.0, score: 0.9, id };
        let mut peaks = vec![Vec::new(); NUM_BODY_KEYPOINTS];
        peaks[1] = vec![peak(2.0, 0)];
        peaks[2] = vec![peak(8.0, 1)];
        peaks[3] = vec![peak(14.0, 2)];

        let mut pafs = Array3::<f32>::zeros((38, 6, 20));
        // neck→shoulder and shoulder→elbow point along +x
        pafs.index_axis_mut(Axis(0), 12).fill(1.0);
        pafs.index_axis_mut(Axis(0), 14).fill(1.0);

        let poses = group_keypoints(&peaks, pafs.view(), &config);
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].count, 3);
        assert!(poses[0].keypoints[1].is_some());
        assert!(poses[0].keypoints[3].is_some());
    }

    #[test]
    fn test_weak_paf_drops_pose() {
        let config = DecoderConfig::default();
        let mut peaks = vec![Vec::new(); NUM_BODY_KEYPOINTS];
        peaks[1] = vec![Peak { x: 2.0, y: 2.0, score: 0.9, id: 0 }];
        peaks[2] = vec![Peak { x: 8.0, y: 2.0, score: 0.9, id: 1 }];
        let pafs = Array3::<f32>::zeros((38, 6, 20));
        assert!(group_keypoints(&peaks, pafs.view(), &config).is_empty());
    }
}
