//! Second-stage detection: per-class suppression and global top-K.
//!
//! For every class column the detector keeps proposals scoring strictly
//! above the confidence threshold, suppresses overlaps with the shared greedy
//! NMS and tags survivors with the class index. Results are concatenated in
//! class order. An empty result is replaced by one placeholder record; a
//! result larger than `top_k` is re-ranked by score across classes and
//! truncated.

mod result;

pub use result::{Detection, Detections};

use crate::candidate::nms::{nms_above, NmsConfig};
use crate::candidate::topk::rank_desc;
use crate::coder::{decode, BoxCoder, Offset, ScoreActivation};
use crate::geometry::{corners_to_centers, CornerBox};
use crate::tensor::ScoreMatrix;
use crate::trace::{stage_event, stage_span};
use crate::util::{DetPostError, DetPostResult};

/// Configuration for the detection stage.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectConfig {
    /// Score columns per proposal, background included.
    pub num_classes: usize,
    /// Column holding the background score, if any.
    pub background: Option<usize>,
    /// Skip the background column during per-class suppression.
    pub skip_background: bool,
    /// Scores at or below this value are discarded.
    pub conf_threshold: f32,
    /// IoU above which a lower-scored box of the same class is suppressed.
    pub iou_threshold: f32,
    /// Maximum detections returned.
    pub top_k: usize,
    /// Parallel suppression (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self::with_background_last(21)
    }
}

impl DetectConfig {
    /// Background stored in the last of `num_classes` columns.
    pub fn with_background_last(num_classes: usize) -> Self {
        Self {
            num_classes,
            background: num_classes.checked_sub(1),
            skip_background: true,
            conf_threshold: 0.05,
            iou_threshold: 0.5,
            top_k: 300,
            parallel: false,
        }
    }

    /// Twenty VOC classes plus background.
    pub fn voc() -> Self {
        Self::with_background_last(21)
    }

    /// Eighty COCO classes plus background.
    pub fn coco() -> Self {
        Self::with_background_last(81)
    }

    /// Label used for the placeholder record.
    pub fn placeholder_label(&self) -> usize {
        self.background.unwrap_or(self.num_classes)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DetPostResult<()> {
        if self.num_classes == 0 {
            return Err(DetPostError::InvalidConfig {
                field: "num_classes",
                reason: "must be at least 1",
            });
        }
        if let Some(bg) = self.background {
            if bg >= self.num_classes {
                return Err(DetPostError::InvalidConfig {
                    field: "background",
                    reason: "must index a score column",
                });
            }
        }
        if !self.conf_threshold.is_finite() {
            return Err(DetPostError::InvalidConfig {
                field: "conf_threshold",
                reason: "must be finite",
            });
        }
        if self.top_k == 0 {
            return Err(DetPostError::InvalidConfig {
                field: "top_k",
                reason: "must be at least 1",
            });
        }
        self.nms().validate()
    }

    fn nms(&self) -> NmsConfig {
        NmsConfig {
            iou_threshold: self.iou_threshold,
            top_k: None,
            parallel: self.parallel,
        }
    }

    fn classes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_classes)
            .filter(move |&c| !(self.skip_background && self.background == Some(c)))
    }
}

/// Decoded boxes for the detection stage.
#[derive(Clone, Copy, Debug)]
pub enum ClassBoxes<'a> {
    /// One box per proposal, shared by every class.
    Shared(&'a [CornerBox]),
    /// One box per proposal and class, row-major `[N, C]`.
    PerClass(&'a [CornerBox]),
}

/// Second-stage detector.
#[derive(Clone, Debug, Default)]
pub struct Detector {
    cfg: DetectConfig,
}

impl Detector {
    /// Creates a detector with a validated configuration.
    pub fn new(cfg: DetectConfig) -> DetPostResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &DetectConfig {
        &self.cfg
    }

    /// Runs per-class NMS over decoded boxes and class probabilities.
    ///
    /// `scores` is `[N, C]`. The result is never empty.
    pub fn detect(&self, boxes: ClassBoxes<'_>, scores: &ScoreMatrix) -> DetPostResult<Detections> {
        let cfg = &self.cfg;
        if scores.cols() != cfg.num_classes {
            return Err(DetPostError::ShapeMismatch {
                context: "class columns",
                expected: cfg.num_classes,
                got: scores.cols(),
            });
        }
        let n = scores.rows();
        let expected_boxes = match boxes {
            ClassBoxes::Shared(_) => n,
            ClassBoxes::PerClass(_) => n * cfg.num_classes,
        };
        let got_boxes = match boxes {
            ClassBoxes::Shared(b) | ClassBoxes::PerClass(b) => b.len(),
        };
        if got_boxes != expected_boxes {
            return Err(DetPostError::ShapeMismatch {
                context: "detection boxes",
                expected: expected_boxes,
                got: got_boxes,
            });
        }

        let _span = stage_span!("detect", proposals = n, classes = cfg.num_classes).entered();
        let nms_cfg = cfg.nms();
        let mut out = Detections::with_capacity(n);
        let mut scratch = Vec::with_capacity(n);

        for class in cfg.classes() {
            let class_scores = scores.column(class).ok_or(DetPostError::IndexOutOfBounds {
                index: class,
                len: cfg.num_classes,
                context: "class column",
            })?;
            let class_boxes: &[CornerBox] = match boxes {
                ClassBoxes::Shared(b) => b,
                ClassBoxes::PerClass(b) => {
                    scratch.clear();
                    scratch.extend((0..n).map(|i| b[i * cfg.num_classes + class]));
                    &scratch[..]
                }
            };
            let kept = nms_above(class_boxes, &class_scores, cfg.conf_threshold, &nms_cfg)?;
            for i in kept {
                out.push(class_boxes[i], class, class_scores[i]);
            }
        }

        if out.is_empty() {
            stage_event!("detections", count = 0usize, placeholder = true);
            return Ok(Detections::placeholder(cfg.placeholder_label()));
        }

        if out.len() > cfg.top_k {
            let mut order = rank_desc(&out.scores);
            order.truncate(cfg.top_k);
            let mut ranked = Detections::with_capacity(order.len());
            for i in order {
                ranked.push(out.boxes[i], out.labels[i], out.scores[i]);
            }
            out = ranked;
        }

        stage_event!("detections", count = out.len(), placeholder = false);
        Ok(out)
    }

    /// Decodes classification-head outputs against proposals, then detects.
    ///
    /// `cls_logits` is `[N, C]` raw logits (softmax is applied here).
    /// `deltas` is `[N, 4]` for class-shared regression or `[N, 4 * C]` for
    /// per-class regression.
    pub fn detect_raw(
        &self,
        coder: &BoxCoder,
        proposals: &[CornerBox],
        cls_logits: ScoreMatrix,
        deltas: &ScoreMatrix,
    ) -> DetPostResult<Detections> {
        let classes = self.cfg.num_classes;
        let references = corners_to_centers(proposals);
        if deltas.cols() == 4 {
            let decoded = coder.post_process_centers(
                &references,
                deltas,
                cls_logits,
                ScoreActivation::Softmax,
            )?;
            return self.detect(ClassBoxes::Shared(&decoded.boxes), &decoded.scores);
        }

        if deltas.cols() != 4 * classes {
            return Err(DetPostError::ShapeMismatch {
                context: "delta columns",
                expected: 4 * classes,
                got: deltas.cols(),
            });
        }
        if deltas.rows() != references.len() {
            return Err(DetPostError::ShapeMismatch {
                context: "delta rows",
                expected: references.len(),
                got: deltas.rows(),
            });
        }
        if cls_logits.rows() != references.len() {
            return Err(DetPostError::ShapeMismatch {
                context: "score rows",
                expected: references.len(),
                got: cls_logits.rows(),
            });
        }
        let mut boxes = Vec::with_capacity(references.len() * classes);
        for (row, reference) in deltas.iter_rows().zip(&references) {
            for chunk in row.chunks_exact(4) {
                let offset = Offset::from_row(chunk)?;
                boxes.push(coder.finish(decode(&offset, reference)));
            }
        }
        let mut scores = cls_logits;
        ScoreActivation::Softmax.apply(&mut scores);
        self.detect(ClassBoxes::PerClass(&boxes), &scores)
    }
}
