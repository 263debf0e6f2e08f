//! Building blocks of the segmented regression: design matrices, logistic
//! segment weights, and quantile breaks.
use crate::error::{MixtureError, Result};
use nalgebra::DMatrix;

/// `nTime x nCoeff` matrix with `t_i^k` at row `i`, column `k`.
pub fn vandermonde(times: &[f64], coeff_num: usize) -> DMatrix<f64> {
    DMatrix::from_fn(times.len(), coeff_num, |i, k| times[i].powi(k as i32))
}

/// Logit of segment `s` at time `t`, `alpha[s,0] + alpha[s,1] * t`.
fn logit(alpha: &DMatrix<f64>, s: usize, t: f64) -> f64 {
    alpha[(s, 0)] + alpha[(s, 1)] * t
}

/// Log of the segment weights at time `t`, a softmax over the rows of `alpha`.
pub fn log_kappa(t: f64, alpha: &DMatrix<f64>) -> Vec<f64> {
    let logits: Vec<_> = (0..alpha.nrows()).map(|s| logit(alpha, s, t)).collect();
    let lse = crate::numeric::logsumexp(&logits);
    logits.iter().map(|v| v - lse).collect()
}

/// Reshape a flat `[a00, a01, a10, a11, ...]` parameter vector into a `nSub x 2` matrix.
pub fn alpha_from_flat(flat: &[f64]) -> DMatrix<f64> {
    assert!(flat.len() % 2 == 0, "odd number of logistic parameters");
    DMatrix::from_row_slice(flat.len() / 2, 2, flat)
}

pub fn flat_from_alpha(alpha: &DMatrix<f64>) -> Vec<f64> {
    (0..alpha.nrows())
        .flat_map(|s| [alpha[(s, 0)], alpha[(s, 1)]])
        .collect()
}

/// Logits of every time and segment, and the log normalizer of each time.
pub fn time_value(times: &[f64], alpha: &DMatrix<f64>) -> (Vec<Vec<f64>>, Vec<f64>) {
    let values: Vec<Vec<f64>> = times
        .iter()
        .map(|&t| (0..alpha.nrows()).map(|s| logit(alpha, s, t)).collect())
        .collect();
    let lse = values
        .iter()
        .map(|row| crate::numeric::logsumexp(row))
        .collect();
    (values, lse)
}

/// Break points of `sub_num` segments over `times`: the minimum, the maximum,
/// and the nearest-rank quantiles at `q/sub_num` with a truncated index.
pub fn quantile_breaks(times: &[f64], sub_num: usize) -> Result<Vec<f64>> {
    if times.is_empty() {
        return Err(MixtureError::EmptyCurve);
    }
    if sub_num == 0 {
        return Err(MixtureError::Configuration(
            "the number of segments should be positive".to_string(),
        ));
    }
    let mut sorted = times.to_vec();
    sorted.sort_by(|x, y| x.total_cmp(y));
    let last = sorted.len() - 1;
    let breaks = (0..=sub_num)
        .map(|q| match q {
            0 => sorted[0],
            _ if q == sub_num => sorted[last],
            _ => sorted[q * last / sub_num],
        })
        .collect();
    Ok(breaks)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn vandermonde_test() {
        let design = vandermonde(&[0f64, 1f64, 2f64], 3);
        assert_eq!(design.shape(), (3, 3));
        assert!((design[(2, 0)] - 1f64).abs() < 0.0001);
        assert!((design[(2, 1)] - 2f64).abs() < 0.0001);
        assert!((design[(2, 2)] - 4f64).abs() < 0.0001);
        assert!((design[(0, 0)] - 1f64).abs() < 0.0001);
    }
    #[test]
    fn kappa_test() {
        let alpha = alpha_from_flat(&[0f64, 0f64, 0f64, 0f64]);
        let kappa = log_kappa(3f64, &alpha);
        assert!(kappa.iter().all(|k| (k.exp() - 0.5).abs() < 0.0001));
        let alpha = alpha_from_flat(&[0f64, 0f64, -10f64, 2f64]);
        let kappa = log_kappa(5f64, &alpha);
        assert!((kappa[0].exp() - 0.5).abs() < 0.0001, "{:?}", kappa);
        let kappa = log_kappa(10f64, &alpha);
        assert!(0.99 < kappa[1].exp(), "{:?}", kappa);
        assert_eq!(flat_from_alpha(&alpha), vec![0f64, 0f64, -10f64, 2f64]);
    }
    #[test]
    fn breaks_test() {
        let times: Vec<_> = (1..=10).rev().map(|x| x as f64).collect();
        let breaks = quantile_breaks(&times, 3).unwrap();
        assert_eq!(breaks, vec![1f64, 4f64, 7f64, 10f64]);
        let breaks = quantile_breaks(&[2f64], 2).unwrap();
        assert_eq!(breaks, vec![2f64; 3]);
        assert!(quantile_breaks(&[], 2).is_err());
    }
}
