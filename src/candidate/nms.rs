//! Greedy IoU non-maximum suppression.
//!
//! Boxes are ranked by descending score, then walked in order: every box
//! still kept suppresses each later kept box whose IoU with it exceeds the
//! threshold. A box never suppresses itself and a suppressed box never comes
//! back. The pairwise IoU work is O(n^2); callers bound `n` beforehand.

use crate::candidate::topk::rank_desc;
use crate::geometry::{iou_pair, CornerBox, IOU_EPS};
use crate::trace::{stage_event, stage_span};
use crate::util::{DetPostError, DetPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Configuration for greedy suppression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsConfig {
    /// Boxes with IoU strictly above this value are suppressed.
    pub iou_threshold: f32,
    /// Optional cap on the number of kept boxes.
    pub top_k: Option<usize>,
    /// Compute overlap rows in parallel (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            top_k: None,
            parallel: false,
        }
    }
}

impl NmsConfig {
    /// Configuration with the given threshold and no cap.
    pub fn with_threshold(iou_threshold: f32) -> Self {
        Self {
            iou_threshold,
            ..Self::default()
        }
    }

    /// Generic reference settings: threshold 0.5, at most 200 boxes.
    pub fn reference() -> Self {
        Self {
            iou_threshold: 0.5,
            top_k: Some(200),
            parallel: false,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DetPostResult<()> {
        if !self.iou_threshold.is_finite() {
            return Err(DetPostError::InvalidConfig {
                field: "iou_threshold",
                reason: "must be finite",
            });
        }
        if self.top_k == Some(0) {
            return Err(DetPostError::InvalidConfig {
                field: "top_k",
                reason: "must be at least 1 when set",
            });
        }
        Ok(())
    }
}

/// Runs greedy NMS and returns kept input indices, best score first.
pub fn nms(boxes: &[CornerBox], scores: &[f32], cfg: &NmsConfig) -> DetPostResult<Vec<usize>> {
    cfg.validate()?;
    if boxes.len() != scores.len() {
        return Err(DetPostError::ShapeMismatch {
            context: "nms scores",
            expected: boxes.len(),
            got: scores.len(),
        });
    }
    let _span = stage_span!("nms", candidates = boxes.len()).entered();

    let order = rank_desc(scores);
    let sorted: Vec<CornerBox> = order.iter().map(|&i| boxes[i]).collect();
    let keep = suppress_sorted(&sorted, cfg);

    let mut kept: Vec<usize> = order
        .into_iter()
        .zip(keep)
        .filter_map(|(idx, k)| k.then_some(idx))
        .collect();
    if let Some(top_k) = cfg.top_k {
        kept.truncate(top_k);
    }

    stage_event!("nms_kept", count = kept.len());
    Ok(kept)
}

/// Runs NMS over the boxes scoring strictly above `score_threshold`.
///
/// Returns kept input indices, best first; empty when nothing qualifies.
pub fn nms_above(
    boxes: &[CornerBox],
    scores: &[f32],
    score_threshold: f32,
    cfg: &NmsConfig,
) -> DetPostResult<Vec<usize>> {
    if boxes.len() != scores.len() {
        return Err(DetPostError::ShapeMismatch {
            context: "nms scores",
            expected: boxes.len(),
            got: scores.len(),
        });
    }
    let qualified: Vec<usize> = (0..scores.len())
        .filter(|&i| scores[i] > score_threshold)
        .collect();
    if qualified.is_empty() {
        return Ok(Vec::new());
    }
    let sub_boxes: Vec<CornerBox> = qualified.iter().map(|&i| boxes[i]).collect();
    let sub_scores: Vec<f32> = qualified.iter().map(|&i| scores[i]).collect();
    let kept = nms(&sub_boxes, &sub_scores, cfg)?;
    Ok(kept.into_iter().map(|i| qualified[i]).collect())
}

/// Keep mask for boxes already sorted by descending score.
fn suppress_sorted(sorted: &[CornerBox], cfg: &NmsConfig) -> Vec<bool> {
    let n = sorted.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        if !keep[i] {
            continue;
        }
        let current = sorted[i];
        let (_, rest) = keep.split_at_mut(i + 1);
        let later = &sorted[i + 1..];
        if cfg.parallel {
            suppress_row_par(&current, later, rest, cfg.iou_threshold);
        } else {
            suppress_row(&current, later, rest, cfg.iou_threshold);
        }
    }
    keep
}

fn suppress_row(current: &CornerBox, later: &[CornerBox], keep: &mut [bool], threshold: f32) {
    for (flag, other) in keep.iter_mut().zip(later) {
        if *flag && iou_pair(current, other, IOU_EPS) > threshold {
            *flag = false;
        }
    }
}

#[cfg(feature = "rayon")]
fn suppress_row_par(current: &CornerBox, later: &[CornerBox], keep: &mut [bool], threshold: f32) {
    keep.par_iter_mut()
        .zip(later.par_iter())
        .for_each(|(flag, other)| {
            if *flag && iou_pair(current, other, IOU_EPS) > threshold {
                *flag = false;
            }
        });
}

#[cfg(not(feature = "rayon"))]
fn suppress_row_par(current: &CornerBox, later: &[CornerBox], keep: &mut [bool], threshold: f32) {
    suppress_row(current, later, keep, threshold);
}
