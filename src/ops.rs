//! Numeric helpers shared by training and inference.

/// Probability floor used when taking the log of a prediction.
pub const LOG_EPS: f32 = 1e-12;

/// Softmax in-place.
#[inline]
pub fn softmax(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    let max_val = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for xi in x.iter_mut() {
        *xi = (*xi - max_val).exp();
        sum += *xi;
    }
    for xi in x.iter_mut() {
        *xi /= sum;
    }
}

/// Returns the index of the maximum element; the first one wins on ties.
#[inline]
pub fn argmax(x: &[f32]) -> usize {
    let mut max_idx = 0;
    let mut max_val = f32::NEG_INFINITY;
    for (i, &v) in x.iter().enumerate() {
        if v > max_val {
            max_val = v;
            max_idx = i;
        }
    }
    max_idx
}

/// The `k` most probable `(index, prob)` pairs, highest first.
///
/// Equal probabilities keep index order. `k` is clamped to `probs.len()`.
pub fn top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k.min(probs.len()));
    ranked
}

/// Negative log-likelihood of `target` under `probs`.
#[inline]
pub fn cross_entropy(probs: &[f32], target: usize) -> f32 {
    -probs[target].max(LOG_EPS).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let mut x = vec![1.0, 2.0, 3.0, 1000.0];
        softmax(&mut x);
        let sum: f32 = x.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(x[3] > 0.99);
    }

    #[test]
    fn softmax_of_zeros_is_uniform() {
        let mut x = vec![0.0; 4];
        softmax(&mut x);
        assert!(x.iter().all(|&p| (p - 0.25).abs() < 1e-7));
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[0.25; 4]), 0);
    }

    #[test]
    fn top_k_is_sorted_and_clamped() {
        let probs = [0.1, 0.4, 0.2, 0.3];
        let top = top_k(&probs, 2);
        assert_eq!(top, vec![(1, 0.4), (3, 0.3)]);
        assert_eq!(top_k(&probs, 10).len(), 4);
        assert!(top_k(&probs, 0).is_empty());
    }

    #[test]
    fn cross_entropy_is_floored() {
        assert!((cross_entropy(&[0.5, 0.5], 0) - std::f32::consts::LN_2).abs() < 1e-6);
        assert!(cross_entropy(&[1.0, 0.0], 1).is_finite());
    }
}
