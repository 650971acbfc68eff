//! Box coding between regression offsets and absolute boxes.
//!
//! Offsets are expressed relative to a reference (anchor) box in center-size
//! form: center shifts are scaled by the anchor size, width and height are
//! log ratios. `decode(encode(gt, a), a) == gt` up to rounding for any
//! positive-size anchor. Non-positive anchor sizes are not checked and
//! produce NaN or infinite values.

use crate::anchor::AnchorSet;
use crate::geometry::{CenterBox, CornerBox};
use crate::tensor::ScoreMatrix;
use crate::trace::stage_event;
use crate::util::math::{sigmoid, softmax_in_place};
use crate::util::{DetPostError, DetPostResult};

/// Regression offsets for one box relative to its anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Offset {
    /// Center x shift in anchor widths.
    pub dcx: f32,
    /// Center y shift in anchor heights.
    pub dcy: f32,
    /// Log width ratio.
    pub dlw: f32,
    /// Log height ratio.
    pub dlh: f32,
}

impl Offset {
    /// Creates an offset vector.
    pub const fn new(dcx: f32, dcy: f32, dlw: f32, dlh: f32) -> Self {
        Self { dcx, dcy, dlw, dlh }
    }

    /// Reads an offset from a 4-value row.
    pub fn from_row(row: &[f32]) -> DetPostResult<Self> {
        match row {
            [dcx, dcy, dlw, dlh] => Ok(Self::new(*dcx, *dcy, *dlw, *dlh)),
            _ => Err(DetPostError::ShapeMismatch {
                context: "offset row",
                expected: 4,
                got: row.len(),
            }),
        }
    }

    /// Returns `[dcx, dcy, dlw, dlh]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.dcx, self.dcy, self.dlw, self.dlh]
    }
}

impl From<[f32; 4]> for Offset {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// Encodes a ground-truth box against an anchor.
#[inline]
pub fn encode(gt: &CenterBox, anchor: &CenterBox) -> Offset {
    Offset {
        dcx: (gt.cx - anchor.cx) / anchor.w,
        dcy: (gt.cy - anchor.cy) / anchor.h,
        dlw: (gt.w / anchor.w).ln(),
        dlh: (gt.h / anchor.h).ln(),
    }
}

/// Decodes an offset against an anchor.
#[inline]
pub fn decode(offset: &Offset, anchor: &CenterBox) -> CenterBox {
    CenterBox {
        cx: offset.dcx * anchor.w + anchor.cx,
        cy: offset.dcy * anchor.h + anchor.cy,
        w: offset.dlw.exp() * anchor.w,
        h: offset.dlh.exp() * anchor.h,
    }
}

/// Encodes paired ground-truth boxes and anchors.
pub fn encode_all(gt: &[CenterBox], anchors: &[CenterBox]) -> DetPostResult<Vec<Offset>> {
    check_paired(gt.len(), anchors.len())?;
    Ok(gt.iter().zip(anchors).map(|(g, a)| encode(g, a)).collect())
}

/// Decodes paired offsets and anchors.
pub fn decode_all(offsets: &[Offset], anchors: &[CenterBox]) -> DetPostResult<Vec<CenterBox>> {
    check_paired(offsets.len(), anchors.len())?;
    Ok(offsets
        .iter()
        .zip(anchors)
        .map(|(o, a)| decode(o, a))
        .collect())
}

fn check_paired(n: usize, anchors: usize) -> DetPostResult<()> {
    if n != anchors {
        return Err(DetPostError::ShapeMismatch {
            context: "anchors",
            expected: anchors,
            got: n,
        });
    }
    Ok(())
}

/// Activation applied to raw scores during post-processing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScoreActivation {
    /// Scores are passed through unchanged.
    #[default]
    Identity,
    /// Element-wise logistic sigmoid.
    Sigmoid,
    /// Softmax across each row.
    Softmax,
}

impl ScoreActivation {
    pub(crate) fn apply(self, scores: &mut ScoreMatrix) {
        match self {
            ScoreActivation::Identity => {}
            ScoreActivation::Sigmoid => {
                for row in scores.rows_mut() {
                    for value in row.iter_mut() {
                        *value = sigmoid(*value);
                    }
                }
            }
            ScoreActivation::Softmax => {
                for row in scores.rows_mut() {
                    softmax_in_place(row);
                }
            }
        }
    }
}

/// Decoded boxes with their scores, in anchor order.
#[derive(Clone, Debug)]
pub struct Decoded {
    /// Absolute boxes in corner form.
    pub boxes: Vec<CornerBox>,
    /// Activated scores, one row per box.
    pub scores: ScoreMatrix,
}

/// Turns raw per-anchor network outputs into boxes and scores.
///
/// The default coder leaves decoded boxes in the anchors' own frame, pixel
/// or normalized. Clipping is opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxCoder {
    /// Optional `(min, max)` clamp applied to decoded corner coordinates.
    pub clip: Option<(f32, f32)>,
}

impl BoxCoder {
    /// Coder that leaves decoded boxes unclipped.
    pub fn unclipped() -> Self {
        Self { clip: None }
    }

    /// Coder that clamps decoded corners to the unit square.
    pub fn unit_clipped() -> Self {
        Self {
            clip: Some((0.0, 1.0)),
        }
    }

    /// Clips to the unit square only for image-normalized anchors.
    pub fn for_anchors(anchors: &AnchorSet) -> Self {
        if anchors.is_normalized() {
            Self::unit_clipped()
        } else {
            Self::unclipped()
        }
    }

    /// Decodes `[N, 4]` deltas into corner boxes, clipping if configured.
    pub fn decode_boxes(
        &self,
        anchors: &[CenterBox],
        deltas: &ScoreMatrix,
    ) -> DetPostResult<Vec<CornerBox>> {
        if deltas.cols() != 4 {
            return Err(DetPostError::ShapeMismatch {
                context: "delta columns",
                expected: 4,
                got: deltas.cols(),
            });
        }
        check_paired(deltas.rows(), anchors.len())?;
        let mut boxes = Vec::with_capacity(anchors.len());
        for (row, anchor) in deltas.iter_rows().zip(anchors) {
            let offset = Offset::from_row(row)?;
            boxes.push(self.finish(decode(&offset, anchor)));
        }
        Ok(boxes)
    }

    pub(crate) fn finish(&self, decoded: CenterBox) -> CornerBox {
        let corner = decoded.to_corner();
        match self.clip {
            Some((lo, hi)) => corner.clamp(lo, hi),
            None => corner,
        }
    }

    /// Decodes deltas against a bound anchor set.
    ///
    /// The set's center-size form is materialized on the first call and
    /// reused afterwards.
    pub fn post_process(
        &self,
        anchors: &AnchorSet,
        deltas: &ScoreMatrix,
        scores: ScoreMatrix,
        activation: ScoreActivation,
    ) -> DetPostResult<Decoded> {
        self.post_process_centers(anchors.centers(), deltas, scores, activation)
    }

    /// Decodes deltas against explicit center-size reference boxes.
    pub fn post_process_centers(
        &self,
        anchors: &[CenterBox],
        deltas: &ScoreMatrix,
        mut scores: ScoreMatrix,
        activation: ScoreActivation,
    ) -> DetPostResult<Decoded> {
        if scores.rows() != anchors.len() {
            return Err(DetPostError::ShapeMismatch {
                context: "score rows",
                expected: anchors.len(),
                got: scores.rows(),
            });
        }
        let boxes = self.decode_boxes(anchors, deltas)?;
        activation.apply(&mut scores);

        stage_event!("decoded", boxes = boxes.len());
        Ok(Decoded { boxes, scores })
    }
}
