//! detpost turns dense two-stage detector outputs into final boxes.
//!
//! The first stage ([`RegionProposer`]) decodes per-anchor objectness logits
//! and regression deltas against an [`AnchorSet`], ranks them, and applies
//! greedy IoU suppression to produce a bounded list of class-agnostic
//! proposals. The second stage ([`Detector`]) takes per-class scores and
//! refined boxes for those proposals, thresholds and suppresses each class,
//! and truncates to a global top-K. Both stages share one suppression
//! routine and one box coder. Optional parallelism is available via the
//! `rayon` feature and instrumentation via `tracing`.

pub mod anchor;
mod candidate;
pub mod coder;
pub mod detect;
pub mod geometry;
pub mod labels;
pub mod lowlevel;
pub mod proposal;
pub mod tensor;
mod trace;
pub mod util;

pub use anchor::{AnchorConfig, AnchorSet};
pub use coder::{decode, encode, BoxCoder, Decoded, Offset, ScoreActivation};
pub use detect::{ClassBoxes, DetectConfig, Detection, Detections, Detector};
pub use geometry::{iou, CenterBox, CornerBox, OverlapMatrix, IOU_EPS};
pub use labels::LabelMap;
pub use proposal::{scale_to_feature, Proposal, ProposalConfig, ProposalMode, RegionProposer};
pub use tensor::{DenseView, ScoreMatrix};
pub use util::{DetPostError, DetPostResult};

pub use candidate::nms::{nms, nms_above, NmsConfig};
pub use candidate::topk::{rank_desc, top_k};
