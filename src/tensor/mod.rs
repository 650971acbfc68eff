//! Dense network outputs and per-row score tables.
//!
//! `DenseView` is a borrowed channel-first `[C, H, W]` tensor as produced by a
//! convolutional head for one image. `ScoreMatrix` is an owned row-major
//! `[N, K]` table: one row per anchor or proposal, `K` values per row.
//! `DenseView::per_anchor` bridges the two by permuting to `[H, W, C]` and
//! splitting the channels into `C / K` anchors of `K` values each.

use crate::util::{DetPostError, DetPostResult};

/// Borrowed channel-first dense tensor for a single image.
#[derive(Copy, Clone, Debug)]
pub struct DenseView<'a> {
    data: &'a [f32],
    channels: usize,
    height: usize,
    width: usize,
}

impl<'a> DenseView<'a> {
    /// Creates a view over `channels * height * width` values.
    pub fn new(
        data: &'a [f32],
        channels: usize,
        height: usize,
        width: usize,
    ) -> DetPostResult<Self> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(DetPostError::InvalidInput(
                "dense tensor dimensions must be non-zero",
            ));
        }
        let needed = channels
            .checked_mul(height)
            .and_then(|v| v.checked_mul(width))
            .ok_or(DetPostError::InvalidInput("dense tensor size overflows"))?;
        if data.len() < needed {
            return Err(DetPostError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            channels,
            height,
            width,
        })
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Spatial height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Spatial width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the value at channel `c`, row `y`, column `x`.
    pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
        if c >= self.channels || y >= self.height || x >= self.width {
            return None;
        }
        self.data
            .get((c * self.height + y) * self.width + x)
            .copied()
    }

    /// Reshapes to one row of `k` values per anchor.
    ///
    /// Row `(y * W + x) * A + a` holds channels `a * k .. a * k + k` at
    /// location `(y, x)`, where `A = C / k`.
    pub fn per_anchor(&self, k: usize) -> DetPostResult<ScoreMatrix> {
        if k == 0 || self.channels % k != 0 {
            return Err(DetPostError::ShapeMismatch {
                context: "channels per anchor",
                expected: k,
                got: self.channels,
            });
        }
        let anchors = self.channels / k;
        let plane = self.height * self.width;
        let mut data = Vec::with_capacity(self.channels * plane);
        for pos in 0..plane {
            for a in 0..anchors {
                for c in 0..k {
                    let channel = a * k + c;
                    data.push(self.data[channel * plane + pos]);
                }
            }
        }
        Ok(ScoreMatrix {
            rows: plane * anchors,
            cols: k,
            data,
        })
    }
}

/// Owned row-major `[rows, cols]` table of scores or deltas.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl ScoreMatrix {
    /// Wraps a row-major buffer of exactly `rows * cols` values.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> DetPostResult<Self> {
        if cols == 0 {
            return Err(DetPostError::InvalidInput("score matrix needs columns"));
        }
        let needed = rows
            .checked_mul(cols)
            .ok_or(DetPostError::InvalidInput("score matrix size overflows"))?;
        if data.len() != needed {
            return Err(DetPostError::ShapeMismatch {
                context: "score matrix buffer",
                expected: needed,
                got: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix from equally sized rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> DetPostResult<Self> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(1);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(DetPostError::ShapeMismatch {
                    context: "score matrix row",
                    expected: cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, rows.len(), cols)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Values per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns row `i`.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows {
            return None;
        }
        self.data.get(i * self.cols..(i + 1) * self.cols)
    }

    /// Returns the value at `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if j >= self.cols {
            return None;
        }
        self.row(i).map(|r| r[j])
    }

    /// Iterates over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.cols)
    }

    /// Copies column `j` out.
    pub fn column(&self, j: usize) -> Option<Vec<f32>> {
        if j >= self.cols {
            return None;
        }
        Some(self.iter_rows().map(|r| r[j]).collect())
    }

    /// Returns the backing row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::{DenseView, ScoreMatrix};
    use crate::util::DetPostError;

    #[test]
    fn per_anchor_permutes_channel_first_layout() {
        // 2 anchors x 2 values, 1 x 2 spatial grid.
        // channel c at position p holds 10 * c + p.
        let data: Vec<f32> = (0..4)
            .flat_map(|c| (0..2).map(move |p| (10 * c + p) as f32))
            .collect();
        let view = DenseView::new(&data, 4, 1, 2).unwrap();
        let m = view.per_anchor(2).unwrap();
        assert_eq!((m.rows(), m.cols()), (4, 2));
        assert_eq!(m.row(0).unwrap(), &[0.0, 10.0]);
        assert_eq!(m.row(1).unwrap(), &[20.0, 30.0]);
        assert_eq!(m.row(2).unwrap(), &[1.0, 11.0]);
        assert_eq!(m.row(3).unwrap(), &[21.0, 31.0]);
    }

    #[test]
    fn per_anchor_rejects_indivisible_channels() {
        let data = [0.0f32; 6];
        let view = DenseView::new(&data, 3, 1, 2).unwrap();
        assert_eq!(
            view.per_anchor(2).err().unwrap(),
            DetPostError::ShapeMismatch {
                context: "channels per anchor",
                expected: 2,
                got: 3,
            }
        );
    }

    #[test]
    fn score_matrix_column_reads_in_row_order() {
        let m = ScoreMatrix::from_rows(&[[0.1f32, 0.9], [0.7, 0.3]]).unwrap();
        assert_eq!(m.column(1).unwrap(), vec![0.9, 0.3]);
        assert!(m.column(2).is_none());
        assert_eq!(m.get(1, 0), Some(0.7));
    }
}
