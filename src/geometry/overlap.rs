//! Pairwise intersection and IoU between box sets.

use crate::geometry::CornerBox;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Epsilon added to the IoU union denominator.
///
/// Keeps zero-area boxes from dividing by zero. Strict IoU would omit it;
/// outputs are kept bit-compatible with pipelines that include it.
pub const IOU_EPS: f32 = 1e-5;

/// Dense row-major `n1 x n2` matrix of pairwise overlap values.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl OverlapMatrix {
    /// Number of rows (boxes in the first set).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (boxes in the second set).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the value for pair `(i, j)` if in bounds.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.rows || j >= self.cols {
            return None;
        }
        self.data.get(i * self.cols + j).copied()
    }

    /// Returns row `i`.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows {
            return None;
        }
        self.data.get(i * self.cols..(i + 1) * self.cols)
    }

    /// Returns the backing row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Intersection area of two corner boxes, clamped at zero per axis.
#[inline]
pub fn intersection_area(a: &CornerBox, b: &CornerBox) -> f32 {
    let lower_x = a.x1.max(b.x1);
    let lower_y = a.y1.max(b.y1);
    let upper_x = a.x2.min(b.x2);
    let upper_y = a.y2.min(b.y2);
    let w = (upper_x - lower_x).max(0.0);
    let h = (upper_y - lower_y).max(0.0);
    w * h
}

/// IoU of two corner boxes with `eps` added to the union.
#[inline]
pub fn iou_pair(a: &CornerBox, b: &CornerBox, eps: f32) -> f32 {
    let inter = intersection_area(a, b);
    let union = a.area() + b.area() - inter + eps;
    inter / union
}

/// Pairwise intersection areas, shape `a.len() x b.len()`.
pub fn intersection(a: &[CornerBox], b: &[CornerBox]) -> OverlapMatrix {
    let mut data = Vec::with_capacity(a.len() * b.len());
    for box_a in a {
        data.extend(b.iter().map(|box_b| intersection_area(box_a, box_b)));
    }
    OverlapMatrix {
        rows: a.len(),
        cols: b.len(),
        data,
    }
}

/// Pairwise IoU using [`IOU_EPS`].
pub fn iou(a: &[CornerBox], b: &[CornerBox]) -> OverlapMatrix {
    iou_with_eps(a, b, IOU_EPS)
}

/// Pairwise IoU with an explicit union epsilon.
pub fn iou_with_eps(a: &[CornerBox], b: &[CornerBox], eps: f32) -> OverlapMatrix {
    let mut data = Vec::with_capacity(a.len() * b.len());
    for box_a in a {
        data.extend(b.iter().map(|box_b| iou_pair(box_a, box_b, eps)));
    }
    OverlapMatrix {
        rows: a.len(),
        cols: b.len(),
        data,
    }
}

/// Row-parallel pairwise IoU (rayon).
///
/// Produces exactly the values of [`iou_with_eps`].
#[cfg(feature = "rayon")]
pub fn iou_with_eps_par(a: &[CornerBox], b: &[CornerBox], eps: f32) -> OverlapMatrix {
    let cols = b.len();
    let mut data = vec![0.0f32; a.len() * cols];
    if cols > 0 {
        data.par_chunks_mut(cols)
            .zip(a.par_iter())
            .for_each(|(row, box_a)| {
                for (value, box_b) in row.iter_mut().zip(b.iter()) {
                    *value = iou_pair(box_a, box_b, eps);
                }
            });
    }
    OverlapMatrix {
        rows: a.len(),
        cols,
        data,
    }
}
