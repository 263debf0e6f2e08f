//! Categorical and uniform draws. Every function takes the generator explicitly.
use rand::Rng;

/// Draw an index with probability proportional to `probs`.
/// Zero, negative, or non-finite total weight falls back to a uniform draw.
pub fn sample_categorical<R: Rng>(rng: &mut R, probs: &[f64]) -> usize {
    assert!(!probs.is_empty(), "cannot sample from an empty distribution");
    let total: f64 = probs.iter().filter(|p| p.is_finite() && 0f64 < **p).sum();
    if total <= 0f64 || !total.is_finite() {
        return rng.gen_range(0..probs.len());
    }
    let mut dart = rng.gen::<f64>() * total;
    for (i, &p) in probs.iter().enumerate() {
        if !(p.is_finite() && 0f64 < p) {
            continue;
        }
        if dart < p {
            return i;
        }
        dart -= p;
    }
    // Rounding error. Return the last index with a positive weight.
    probs
        .iter()
        .rposition(|&p| p.is_finite() && 0f64 < p)
        .unwrap_or(probs.len() - 1)
}

pub fn sample_from_log_weights<R: Rng>(rng: &mut R, log_weights: &[f64]) -> usize {
    let (probs, _) = crate::numeric::log_to_multi(log_weights);
    sample_categorical(rng, &probs)
}

/// Uniform integer in `[lo, hi]`, both ends included.
pub fn sample_uniform_int<R: Rng>(rng: &mut R, lo: usize, hi: usize) -> usize {
    assert!(lo <= hi, "{}>{}", lo, hi);
    rng.gen_range(lo..=hi)
}
