//! Descending score ordering with deterministic tie-breaking.

use std::cmp::Ordering;

/// NaN ranks below every real score.
#[inline]
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Orders `(index, score)` pairs by descending score, then ascending index.
#[inline]
pub(crate) fn score_cmp_desc(a: (usize, f32), b: (usize, f32)) -> Ordering {
    rank_key(b.1)
        .total_cmp(&rank_key(a.1))
        .then_with(|| a.0.cmp(&b.0))
}

/// Returns all indices of `scores` sorted by descending score.
///
/// Equal scores keep their input order, so the same input always yields the
/// same ranking.
pub fn rank_desc(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_unstable_by(|&a, &b| score_cmp_desc((a, scores[a]), (b, scores[b])));
    order
}

/// Returns the indices of the `k` highest scores, best first.
///
/// `k` larger than the input is clamped to the input length.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    let cmp = |a: &usize, b: &usize| score_cmp_desc((*a, scores[*a]), (*b, scores[*b]));
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, cmp);
        order.truncate(k);
    }
    order.sort_unstable_by(cmp);
    order
}

#[cfg(test)]
mod tests {
    use super::{rank_desc, top_k};

    #[test]
    fn rank_breaks_ties_by_index() {
        let order = rank_desc(&[0.5, 0.9, 0.5, 0.9]);
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn nan_ranks_last() {
        let order = rank_desc(&[f32::NAN, 0.1, -1.0]);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn top_k_clamps_to_len() {
        assert_eq!(top_k(&[0.1, 0.3], 10), vec![1, 0]);
        assert!(top_k(&[0.1], 0).is_empty());
    }

    #[test]
    fn top_k_matches_full_sort_prefix() {
        let scores: Vec<f32> = (0..50).map(|i| ((i * 37) % 11) as f32).collect();
        let full = rank_desc(&scores);
        assert_eq!(top_k(&scores, 7), full[..7].to_vec());
    }
}
