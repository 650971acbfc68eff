//! Final detection records.

use crate::geometry::CornerBox;

/// One final detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Box in corner form.
    pub bbox: CornerBox,
    /// Class index.
    pub label: usize,
    /// Confidence score.
    pub score: f32,
}

/// Final detections as three parallel sequences of equal length.
///
/// Produced by [`Detector::detect`](crate::Detector::detect), which never
/// returns an empty set: when nothing qualifies a single placeholder
/// `(0, 0, 1, 1)` with the background label and score 0 is emitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detections {
    pub(crate) boxes: Vec<CornerBox>,
    pub(crate) labels: Vec<usize>,
    pub(crate) scores: Vec<f32>,
}

impl Detections {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            boxes: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
            scores: Vec::with_capacity(n),
        }
    }

    pub(crate) fn placeholder(label: usize) -> Self {
        Self {
            boxes: vec![CornerBox::UNIT],
            labels: vec![label],
            scores: vec![0.0],
        }
    }

    pub(crate) fn push(&mut self, bbox: CornerBox, label: usize, score: f32) {
        self.boxes.push(bbox);
        self.labels.push(label);
        self.scores.push(score);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Boxes, one per record.
    pub fn boxes(&self) -> &[CornerBox] {
        &self.boxes
    }

    /// Class labels, one per record.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Scores, one per record.
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Returns record `i`.
    pub fn get(&self, i: usize) -> Option<Detection> {
        Some(Detection {
            bbox: *self.boxes.get(i)?,
            label: *self.labels.get(i)?,
            score: *self.scores.get(i)?,
        })
    }

    /// Iterates over records in order.
    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Returns true for the single-record "nothing found" result.
    pub fn is_placeholder(&self, background_label: usize) -> bool {
        self.len() == 1
            && self.labels[0] == background_label
            && self.scores[0] == 0.0
            && self.boxes[0] == CornerBox::UNIT
    }

    /// Splits into `(boxes, labels, scores)`.
    pub fn into_parts(self) -> (Vec<CornerBox>, Vec<usize>, Vec<f32>) {
        (self.boxes, self.labels, self.scores)
    }
}
