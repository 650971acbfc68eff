//! Low-level building blocks for custom post-processing pipelines.
//!
//! These expose the geometry kernels, batch coding helpers and ranking
//! primitives used inside [`RegionProposer`](crate::RegionProposer) and
//! [`Detector`](crate::Detector). Most users should prefer those two types.

pub use crate::candidate::nms::{nms, nms_above, NmsConfig};
pub use crate::candidate::topk::{rank_desc, top_k};
pub use crate::coder::{decode_all, encode_all};
pub use crate::geometry::{
    centers_to_corners, corners_to_centers, intersection, intersection_area, iou_pair,
    iou_with_eps,
};
#[cfg(feature = "rayon")]
pub use crate::geometry::iou_with_eps_par;
pub use crate::proposal::{proposal_boxes, DELTA_CHANNELS, FOREGROUND, OBJECTNESS_CHANNELS};
