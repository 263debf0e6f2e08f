//! Small numeric helpers shared by the composer and the component families.
use std::f64::consts::PI;

/// Log of the sum of exponentials. Returns negative infinity for an empty slice.
pub fn logsumexp(xs: &[f64]) -> f64 {
    match xs.len() {
        0 => f64::NEG_INFINITY,
        1 => xs[0],
        _ => {
            let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !max.is_finite() {
                return max;
            }
            let sum = xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln();
            max + sum
        }
    }
}

/// Normalize log weights onto the simplex. Returns the probabilities and the log normalizer.
/// When every weight is negative infinity, the probabilities are uniform.
pub fn log_to_multi(xs: &[f64]) -> (Vec<f64>, f64) {
    let lse = logsumexp(xs);
    if !lse.is_finite() {
        let len = xs.len().max(1) as f64;
        return (vec![1f64 / len; xs.len()], lse);
    }
    let probs = xs.iter().map(|x| (x - lse).exp()).collect();
    (probs, lse)
}

pub fn normal_log_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    -0.5 * z * z - sd.ln() - 0.5 * (2f64 * PI).ln()
}

/// Index of the first maximal element. Zero for an empty slice.
pub fn argmax(xs: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in xs.iter().enumerate() {
        if xs[best] < *x {
            best = i;
        }
    }
    best
}

/// Weighted mean and (biased) weighted variance. `None` if the total weight is not positive.
pub fn weighted_mean_var(xs: &[f64], ws: &[f64]) -> Option<(f64, f64)> {
    assert_eq!(xs.len(), ws.len());
    let total: f64 = ws.iter().sum();
    if total <= 0f64 || !total.is_finite() {
        return None;
    }
    let mean = xs.iter().zip(ws).map(|(x, w)| x * w).sum::<f64>() / total;
    let var = xs
        .iter()
        .zip(ws)
        .map(|(x, w)| w * (x - mean).powi(2))
        .sum::<f64>()
        / total;
    Some((mean, var))
}

/// Pairwise summation. The result only depends on the order of `xs`.
pub fn pairwise_sum(xs: &[f64]) -> f64 {
    const BLOCK: usize = 16;
    if xs.len() <= BLOCK {
        xs.iter().sum()
    } else {
        let (left, right) = xs.split_at(xs.len() / 2);
        pairwise_sum(left) + pairwise_sum(right)
    }
}

/// Trigamma function, the derivative of digamma.
pub fn trigamma(mut x: f64) -> f64 {
    assert!(0f64 < x, "trigamma is defined only for positive values:{}", x);
    let mut acc = 0f64;
    // Shift with the recurrence until the asymptotic series is accurate.
    while x < 6f64 {
        acc += 1f64 / (x * x);
        x += 1f64;
    }
    let x2 = 1f64 / (x * x);
    let series = 1f64 / x
        + x2 / 2f64
        + x2 / x * (1f64 / 6f64 - x2 * (1f64 / 30f64 - x2 * (1f64 / 42f64 - x2 / 30f64)));
    acc + series
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn logsumexp_test() {
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        let xs = [1f64.ln(), 2f64.ln(), 3f64.ln()];
        assert!((logsumexp(&xs) - 6f64.ln()).abs() < 0.0001);
        let xs = [-1000f64, -1000f64];
        assert!((logsumexp(&xs) - (-1000f64 + 2f64.ln())).abs() < 0.0001);
        let xs = [f64::NEG_INFINITY, 0f64];
        assert!(logsumexp(&xs).abs() < 0.0001);
    }
    #[test]
    fn log_to_multi_test() {
        let (probs, lse) = log_to_multi(&[0f64, 0f64, 2f64.ln()]);
        assert!((lse - 4f64.ln()).abs() < 0.0001);
        let answer = [0.25, 0.25, 0.5];
        for (p, a) in probs.iter().zip(answer) {
            assert!((p - a).abs() < 0.0001, "{:?}", probs);
        }
        let (probs, _) = log_to_multi(&[f64::NEG_INFINITY; 4]);
        assert!(probs.iter().all(|&p| (p - 0.25).abs() < 0.0001));
    }
    #[test]
    fn normal_test() {
        let lk = normal_log_pdf(0f64, 0f64, 1f64);
        assert!((lk + 0.918938533).abs() < 0.0001, "{}", lk);
        let lk = normal_log_pdf(3f64, 1f64, 2f64);
        assert!((lk + 0.5 + 2f64.ln() + 0.918938533).abs() < 0.0001, "{}", lk);
    }
    #[test]
    fn argmax_test() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5, 0.2]), 1);
        assert_eq!(argmax(&[3f64]), 0);
    }
    #[test]
    fn weighted_test() {
        let (mean, var) = weighted_mean_var(&[1f64, 2f64, 3f64], &[1f64, 0f64, 1f64]).unwrap();
        assert!((mean - 2f64).abs() < 0.0001);
        assert!((var - 1f64).abs() < 0.0001);
        assert!(weighted_mean_var(&[1f64], &[0f64]).is_none());
    }
    #[test]
    fn pairwise_test() {
        let xs: Vec<_> = (0..1000).map(|x| x as f64).collect();
        assert!((pairwise_sum(&xs) - 499500f64).abs() < 0.0001);
    }
    #[test]
    fn trigamma_test() {
        // psi_1(1) = pi^2/6, psi_1(1/2) = pi^2/2
        assert!((trigamma(1f64) - PI * PI / 6f64).abs() < 1e-6);
        assert!((trigamma(0.5) - PI * PI / 2f64).abs() < 1e-6);
        assert!((trigamma(20f64) - 0.051270822935203).abs() < 1e-6);
    }
}
