//! First-stage region proposal.
//!
//! Dense objectness logits and box deltas are flattened to one row per
//! anchor, decoded against the bound `AnchorSet`, ranked by foreground
//! probability, pre-filtered to a top-K pool, suppressed at IoU 0.7 and
//! truncated to the post-NMS budget. The output is a class-agnostic, score
//! ordered list of boxes.

use crate::anchor::AnchorSet;
use crate::candidate::nms::{nms, NmsConfig};
use crate::candidate::topk::top_k;
use crate::coder::{BoxCoder, ScoreActivation};
use crate::geometry::CornerBox;
use crate::tensor::{DenseView, ScoreMatrix};
use crate::trace::{stage_event, stage_span};
use crate::util::{DetPostError, DetPostResult};

/// Objectness channels per anchor (background, foreground).
pub const OBJECTNESS_CHANNELS: usize = 2;
/// Column holding the foreground logit.
pub const FOREGROUND: usize = 1;
/// Regression channels per anchor.
pub const DELTA_CHANNELS: usize = 4;

/// Selects the candidate budgets for a forward pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProposalMode {
    /// 12000 candidates before NMS, 2000 after.
    #[default]
    Train,
    /// 3000 candidates before NMS, 300 after.
    Test,
}

impl ProposalMode {
    /// Returns `(pre_nms_top_k, post_nms_top_k)`.
    pub fn budgets(self) -> (usize, usize) {
        match self {
            ProposalMode::Train => (12000, 2000),
            ProposalMode::Test => (3000, 300),
        }
    }
}

/// Configuration for region proposal.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalConfig {
    /// Candidates kept after ranking, before NMS.
    pub pre_nms_top_k: usize,
    /// Proposals kept after NMS.
    pub post_nms_top_k: usize,
    /// IoU above which a lower-scored candidate is suppressed.
    pub nms_iou_threshold: f32,
    /// Parallel suppression (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self::for_mode(ProposalMode::Train)
    }
}

impl ProposalConfig {
    /// Budgets for `mode` with the standard 0.7 IoU threshold.
    pub fn for_mode(mode: ProposalMode) -> Self {
        let (pre_nms_top_k, post_nms_top_k) = mode.budgets();
        Self {
            pre_nms_top_k,
            post_nms_top_k,
            nms_iou_threshold: 0.7,
            parallel: false,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DetPostResult<()> {
        if self.pre_nms_top_k == 0 {
            return Err(DetPostError::InvalidConfig {
                field: "pre_nms_top_k",
                reason: "must be at least 1",
            });
        }
        if self.post_nms_top_k == 0 {
            return Err(DetPostError::InvalidConfig {
                field: "post_nms_top_k",
                reason: "must be at least 1",
            });
        }
        self.nms().validate()
    }

    fn nms(&self) -> NmsConfig {
        NmsConfig {
            iou_threshold: self.nms_iou_threshold,
            top_k: None,
            parallel: self.parallel,
        }
    }
}

/// Class-agnostic candidate box with its foreground probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proposal {
    /// Box in corner form, same coordinate frame as the anchors.
    pub bbox: CornerBox,
    /// Sigmoid of the foreground logit.
    pub score: f32,
}

/// First-stage proposal generator.
///
/// Without an explicit coder, decoded boxes are clipped to the unit square
/// only when the anchors are image-normalized.
#[derive(Clone, Debug, Default)]
pub struct RegionProposer {
    coder: Option<BoxCoder>,
    cfg: ProposalConfig,
}

impl RegionProposer {
    /// Creates a proposer with a validated configuration.
    pub fn new(cfg: ProposalConfig) -> DetPostResult<Self> {
        cfg.validate()?;
        Ok(Self {
            coder: None,
            cfg,
        })
    }

    /// Creates a proposer with the budgets of `mode`.
    pub fn for_mode(mode: ProposalMode) -> Self {
        Self {
            coder: None,
            cfg: ProposalConfig::for_mode(mode),
        }
    }

    /// Pins the box coder regardless of the anchor frame.
    pub fn with_coder(mut self, coder: BoxCoder) -> Self {
        self.coder = Some(coder);
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ProposalConfig {
        &self.cfg
    }

    /// Proposes regions from channel-first head outputs.
    ///
    /// `cls` holds `2 * A` channels and `reg` holds `4 * A` channels over the
    /// same `H x W` grid, where `A` anchors share each location.
    pub fn propose(
        &self,
        anchors: &AnchorSet,
        cls: DenseView<'_>,
        reg: DenseView<'_>,
    ) -> DetPostResult<Vec<Proposal>> {
        if cls.height() != reg.height() || cls.width() != reg.width() {
            return Err(DetPostError::InvalidInput(
                "objectness and regression grids differ in size",
            ));
        }
        let scores = cls.per_anchor(OBJECTNESS_CHANNELS)?;
        let deltas = reg.per_anchor(DELTA_CHANNELS)?;
        if scores.rows() != deltas.rows() {
            return Err(DetPostError::ShapeMismatch {
                context: "anchors per location",
                expected: scores.rows(),
                got: deltas.rows(),
            });
        }
        self.propose_flat(anchors, scores, &deltas)
    }

    /// Proposes regions from already flattened per-anchor rows.
    ///
    /// `scores` is `[N, 2]` raw logits, `deltas` is `[N, 4]`, both in anchor
    /// order.
    pub fn propose_flat(
        &self,
        anchors: &AnchorSet,
        scores: ScoreMatrix,
        deltas: &ScoreMatrix,
    ) -> DetPostResult<Vec<Proposal>> {
        if scores.cols() != OBJECTNESS_CHANNELS {
            return Err(DetPostError::ShapeMismatch {
                context: "objectness columns",
                expected: OBJECTNESS_CHANNELS,
                got: scores.cols(),
            });
        }
        let _span = stage_span!("propose_region", anchors = anchors.len()).entered();

        let decoded = self
            .coder
            .unwrap_or_else(|| BoxCoder::for_anchors(anchors))
            .post_process(anchors, deltas, scores, ScoreActivation::Sigmoid)?;
        let foreground = decoded
            .scores
            .column(FOREGROUND)
            .ok_or(DetPostError::IndexOutOfBounds {
                index: FOREGROUND,
                len: decoded.scores.cols(),
                context: "objectness column",
            })?;

        let pool = top_k(&foreground, self.cfg.pre_nms_top_k);
        let pool_boxes: Vec<CornerBox> = pool.iter().map(|&i| decoded.boxes[i]).collect();
        let pool_scores: Vec<f32> = pool.iter().map(|&i| foreground[i]).collect();
        stage_event!("pre_nms_pool", count = pool.len());

        let mut kept = nms(&pool_boxes, &pool_scores, &self.cfg.nms())?;
        kept.truncate(self.cfg.post_nms_top_k);

        let proposals: Vec<Proposal> = kept
            .into_iter()
            .map(|i| Proposal {
                bbox: pool_boxes[i],
                score: pool_scores[i],
            })
            .collect();
        stage_event!("proposals", count = proposals.len());
        Ok(proposals)
    }
}

/// Extracts the boxes of a proposal list.
pub fn proposal_boxes(proposals: &[Proposal]) -> Vec<CornerBox> {
    proposals.iter().map(|p| p.bbox).collect()
}

/// Rescales normalized proposals to feature-map pixel coordinates.
///
/// x coordinates are multiplied by `feature_width`, y coordinates by
/// `feature_height`; this is the frame RoI pooling expects.
pub fn scale_to_feature(
    proposals: &[CornerBox],
    feature_height: usize,
    feature_width: usize,
) -> Vec<CornerBox> {
    let sx = feature_width as f32;
    let sy = feature_height as f32;
    proposals.iter().map(|b| b.scale(sx, sy)).collect()
}
