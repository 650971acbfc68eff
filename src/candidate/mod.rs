//! Candidate ranking and suppression.
//!
//! Includes deterministic descending-score ordering, top-K selection and
//! greedy IoU-based non-maximum suppression shared by both pipeline stages.

pub(crate) mod nms;
pub(crate) mod topk;
