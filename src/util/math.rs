//! Score activations shared by both pipeline stages.

/// Logistic sigmoid.
#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax over a row, in place.
///
/// `+inf` logits share all the mass. Otherwise a row that cannot be
/// normalized, such as all `-inf` or one holding NaN, comes out as NaN.
pub(crate) fn softmax_in_place(row: &mut [f32]) {
    if row.is_empty() {
        return;
    }
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::INFINITY {
        let winners = row.iter().filter(|&&v| v == f32::INFINITY).count() as f32;
        for value in row.iter_mut() {
            *value = if *value == f32::INFINITY { 1.0 / winners } else { 0.0 };
        }
        return;
    }
    if max == f32::NEG_INFINITY {
        row.fill(f32::NAN);
        return;
    }
    let mut sum = 0.0f32;
    for value in row.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    if !(sum.is_finite() && sum > 0.0) {
        row.fill(f32::NAN);
        return;
    }
    for value in row.iter_mut() {
        *value /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::{sigmoid, softmax_in_place};

    #[test]
    fn sigmoid_is_centered_and_monotonic() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-7);
        assert!(sigmoid(-2.0) < sigmoid(1.0));
        assert!(sigmoid(20.0) > 0.999);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut row = [1.0f32, 2.0, 3.0];
        softmax_in_place(&mut row);
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(row[2] > row[1] && row[1] > row[0]);
    }

    #[test]
    fn softmax_survives_large_logits() {
        let mut row = [1000.0f32, 1000.0];
        softmax_in_place(&mut row);
        assert!((row[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn softmax_infinite_logit_takes_all_mass() {
        let mut row = [f32::INFINITY, 0.0, 0.0];
        softmax_in_place(&mut row);
        assert_eq!(row, [1.0, 0.0, 0.0]);

        let mut tied = [f32::INFINITY, -3.0, f32::INFINITY];
        softmax_in_place(&mut tied);
        assert_eq!(tied, [0.5, 0.0, 0.5]);
    }

    #[test]
    fn softmax_without_usable_logits_is_nan() {
        let mut row = [f32::NEG_INFINITY; 3];
        softmax_in_place(&mut row);
        assert!(row.iter().all(|v| v.is_nan()));

        let mut poisoned = [1.0f32, f32::NAN];
        softmax_in_place(&mut poisoned);
        assert!(poisoned.iter().all(|v| v.is_nan()));
    }
}
