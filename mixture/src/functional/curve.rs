//! One observed curve and the latent segment of each of its time points.
use super::computation;
use crate::error::{MixtureError, Result};
use crate::numeric::{log_to_multi, logsumexp, normal_log_pdf};
use crate::sampler::{sample_categorical, sample_from_log_weights, sample_uniform_int};
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct Curve {
    times: Vec<f64>,
    values: Vec<f64>,
    /// `segments[s]` holds the indices of the time points in segment `s`.
    segments: Vec<BTreeSet<usize>>,
    design: DMatrix<f64>,
}

impl Curve {
    /// A curve with every point in segment 0 and its design matrix already built.
    pub fn new(times: Vec<f64>, values: Vec<f64>, sub_num: usize, coeff_num: usize) -> Result<Self> {
        if times.len() != values.len() {
            return Err(MixtureError::Configuration(format!(
                "{} times and {} values",
                times.len(),
                values.len()
            )));
        }
        if sub_num == 0 {
            return Err(MixtureError::Configuration(
                "a curve needs at least one segment".to_string(),
            ));
        }
        let mut segments = vec![BTreeSet::new(); sub_num];
        segments[0].extend(0..times.len());
        let design = computation::vandermonde(&times, coeff_num);
        Ok(Self {
            times,
            values,
            segments,
            design,
        })
    }
    pub fn from_definition(curve: &definitions::Curve, sub_num: usize, coeff_num: usize) -> Result<Self> {
        Self::new(curve.times.clone(), curve.values.clone(), sub_num, coeff_num)
    }
    pub fn to_definition(&self) -> definitions::Curve {
        definitions::Curve::new(self.times.clone(), self.values.clone())
    }
    /// Resize the storage. Previous contents are discarded.
    pub fn set_size(&mut self, time_num: usize, sub_num: usize) -> Result<()> {
        if sub_num == 0 {
            return Err(MixtureError::Configuration(
                "a curve needs at least one segment".to_string(),
            ));
        }
        self.times = vec![0f64; time_num];
        self.values = vec![0f64; time_num];
        self.segments = vec![BTreeSet::new(); sub_num];
        self.design = DMatrix::zeros(0, 0);
        Ok(())
    }
    /// Replace the contents. Each segment index must point at a time point,
    /// and no index may be in two segments.
    pub fn set_values(
        &mut self,
        times: Vec<f64>,
        values: Vec<f64>,
        segments: Vec<BTreeSet<usize>>,
    ) -> Result<()> {
        if times.len() != values.len() {
            return Err(MixtureError::Configuration(format!(
                "{} times and {} values",
                times.len(),
                values.len()
            )));
        }
        if segments.is_empty() {
            return Err(MixtureError::Configuration(
                "a curve needs at least one segment".to_string(),
            ));
        }
        let len = times.len();
        let mut seen = vec![false; len];
        for &i in segments.iter().flatten() {
            match seen.get_mut(i) {
                None => return Err(MixtureError::IndexOutOfRange { index: i, len }),
                Some(true) => {
                    return Err(MixtureError::Configuration(format!(
                        "time point {} is in two segments",
                        i
                    )))
                }
                Some(flag) => *flag = true,
            }
        }
        self.times = times;
        self.values = values;
        self.segments = segments;
        Ok(())
    }
    pub fn set_value_at(&mut self, i: usize, t: f64, x: f64) -> Result<()> {
        let len = self.times.len();
        match (self.times.get_mut(i), self.values.get_mut(i)) {
            (Some(time), Some(value)) => {
                *time = t;
                *value = x;
                Ok(())
            }
            _ => Err(MixtureError::IndexOutOfRange { index: i, len }),
        }
    }
    /// Must be called again after the times change.
    pub fn compute_design_matrix(&mut self, coeff_num: usize) {
        self.design = computation::vandermonde(&self.times, coeff_num);
    }
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
    pub fn sub_num(&self) -> usize {
        self.segments.len()
    }
    pub fn times(&self) -> &[f64] {
        &self.times
    }
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    pub fn segments(&self) -> &[BTreeSet<usize>] {
        &self.segments
    }
    pub fn design(&self) -> &DMatrix<f64> {
        &self.design
    }
    /// Segment of each time point.
    pub fn labels(&self) -> Vec<usize> {
        let mut labels = vec![0; self.len()];
        for (s, segment) in self.segments.iter().enumerate() {
            for &i in segment.iter() {
                labels[i] = s;
            }
        }
        labels
    }
    fn check_parameters(&self, alpha: &DMatrix<f64>, beta: &DMatrix<f64>, sd: &[f64]) -> Result<()> {
        if self.is_empty() {
            return Err(MixtureError::EmptyCurve);
        }
        let sub_num = self.sub_num();
        if alpha.shape() != (sub_num, 2) || beta.nrows() != sub_num || sd.len() != sub_num {
            return Err(MixtureError::Configuration(format!(
                "parameters do not match {} segments",
                sub_num
            )));
        }
        if self.design.shape() != (self.len(), beta.ncols()) {
            return Err(MixtureError::Configuration(format!(
                "the design matrix is {:?}, expected ({}, {})",
                self.design.shape(),
                self.len(),
                beta.ncols()
            )));
        }
        Ok(())
    }
    /// `nTime x nSub` matrix of `log kappa_s(t_i) + log N(x_i; X_i beta_s, sd_s)`.
    pub fn joint_log_probability(
        &self,
        alpha: &DMatrix<f64>,
        beta: &DMatrix<f64>,
        sd: &[f64],
    ) -> Result<DMatrix<f64>> {
        self.check_parameters(alpha, beta, sd)?;
        Ok(self.joint_log_probability_unchecked(alpha, beta, sd))
    }
    pub(crate) fn joint_log_probability_unchecked(
        &self,
        alpha: &DMatrix<f64>,
        beta: &DMatrix<f64>,
        sd: &[f64],
    ) -> DMatrix<f64> {
        let sub_num = self.sub_num();
        let mut joint = DMatrix::zeros(self.len(), sub_num);
        for (i, (&t, &x)) in self.times.iter().zip(self.values.iter()).enumerate() {
            let log_kappa = computation::log_kappa(t, alpha);
            let row = self.design.row(i);
            for s in 0..sub_num {
                let mean = row.dot(&beta.row(s));
                joint[(i, s)] = log_kappa[s] + normal_log_pdf(x, mean, sd[s]);
            }
        }
        joint
    }
    pub fn completed_log_likelihood(
        &self,
        alpha: &DMatrix<f64>,
        beta: &DMatrix<f64>,
        sd: &[f64],
    ) -> Result<f64> {
        self.check_parameters(alpha, beta, sd)?;
        Ok(self.completed_unchecked(alpha, beta, sd))
    }
    pub(crate) fn completed_unchecked(&self, alpha: &DMatrix<f64>, beta: &DMatrix<f64>, sd: &[f64]) -> f64 {
        let joint = self.joint_log_probability_unchecked(alpha, beta, sd);
        self.segments
            .iter()
            .enumerate()
            .flat_map(|(s, segment)| segment.iter().map(move |&i| (i, s)))
            .map(|(i, s)| joint[(i, s)])
            .sum()
    }
    pub fn observed_log_likelihood(
        &self,
        alpha: &DMatrix<f64>,
        beta: &DMatrix<f64>,
        sd: &[f64],
    ) -> Result<f64> {
        self.check_parameters(alpha, beta, sd)?;
        Ok(self.observed_unchecked(alpha, beta, sd))
    }
    pub(crate) fn observed_unchecked(&self, alpha: &DMatrix<f64>, beta: &DMatrix<f64>, sd: &[f64]) -> f64 {
        let joint = self.joint_log_probability_unchecked(alpha, beta, sd);
        joint
            .row_iter()
            .map(|row| {
                let row: Vec<_> = row.iter().copied().collect();
                logsumexp(&row)
            })
            .sum()
    }
    fn clear_segments(&mut self) {
        self.segments.iter_mut().for_each(|s| s.clear());
    }
    /// Draw the segment of every time point from its posterior.
    pub fn sample_segments<R: Rng>(
        &mut self,
        alpha: &DMatrix<f64>,
        beta: &DMatrix<f64>,
        sd: &[f64],
        rng: &mut R,
    ) -> Result<()> {
        let joint = self.joint_log_probability(alpha, beta, sd)?;
        self.clear_segments();
        for (i, row) in joint.row_iter().enumerate() {
            let row: Vec<_> = row.iter().copied().collect();
            let s = sample_from_log_weights(rng, &row);
            self.segments[s].insert(i);
        }
        Ok(())
    }
    /// Put every time point in its most probable segment.
    pub fn impute_map(&mut self, alpha: &DMatrix<f64>, beta: &DMatrix<f64>, sd: &[f64]) -> Result<()> {
        let joint = self.joint_log_probability(alpha, beta, sd)?;
        self.clear_segments();
        for (i, row) in joint.row_iter().enumerate() {
            let row: Vec<_> = row.iter().copied().collect();
            let s = crate::numeric::argmax(&row);
            self.segments[s].insert(i);
        }
        Ok(())
    }
    pub fn impute_uniform<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        if self.is_empty() {
            return Err(MixtureError::EmptyCurve);
        }
        self.clear_segments();
        let last = self.sub_num() - 1;
        for i in 0..self.len() {
            self.segments[sample_uniform_int(rng, 0, last)].insert(i);
        }
        Ok(())
    }
    fn check_quantiles(&self, quantiles: &[f64]) -> Result<()> {
        if self.is_empty() {
            return Err(MixtureError::EmptyCurve);
        }
        if quantiles.len() != self.sub_num() + 1 {
            return Err(MixtureError::Configuration(format!(
                "{} quantiles for {} segments",
                quantiles.len(),
                self.sub_num()
            )));
        }
        Ok(())
    }
    /// Deterministic assignment by quantile bins. A point equal to an interior
    /// break goes to the lower bin; a point matching no bin goes to segment 0.
    pub fn impute_by_quantile(&mut self, quantiles: &[f64]) -> Result<()> {
        self.check_quantiles(quantiles)?;
        self.clear_segments();
        let sub_num = self.sub_num();
        let quantile_num = quantiles.len();
        for (i, &t) in self.times.iter().enumerate() {
            let s = if t < quantiles[1] {
                0
            } else if quantiles[quantile_num - 2] < t {
                sub_num - 1
            } else {
                (1..sub_num - 1)
                    .find(|&q| quantiles[q] < t && t <= quantiles[q + 1])
                    .unwrap_or(0)
            };
            self.segments[s].insert(i);
        }
        Ok(())
    }
    /// Random assignment weighted by the distance to the two nearest bin midpoints.
    pub fn impute_by_quantile_mixing<R: Rng>(&mut self, quantiles: &[f64], rng: &mut R) -> Result<()> {
        self.check_quantiles(quantiles)?;
        self.clear_segments();
        let sub_num = self.sub_num();
        let midpoints: Vec<_> = quantiles.windows(2).map(|w| (w[0] + w[1]) / 2f64).collect();
        let mut probs = vec![0f64; sub_num];
        for (i, &t) in self.times.iter().enumerate() {
            probs.iter_mut().for_each(|p| *p = 0f64);
            if t < midpoints[0] {
                probs[0] = 1f64;
            } else if midpoints[sub_num - 1] <= t {
                probs[sub_num - 1] = 1f64;
            } else {
                // midpoints[0] <= t < midpoints[last], so a bracket exists.
                let s = (0..sub_num - 1)
                    .find(|&s| midpoints[s] <= t && t < midpoints[s + 1])
                    .unwrap_or(0);
                let left = t - midpoints[s];
                let right = midpoints[s + 1] - t;
                probs[s] = right / (left + right);
                probs[s + 1] = left / (left + right);
            }
            self.segments[sample_categorical(rng, &probs)].insert(i);
        }
        Ok(())
    }
    pub fn compute_quantile_breaks(&self) -> Result<Vec<f64>> {
        computation::quantile_breaks(&self.times, self.sub_num())
    }
    /// Negative log-likelihood of the current segments under the logistic
    /// weights `alpha_flat` (`[a00, a01, a10, a11, ...]`, two per segment).
    /// When `grad` is given, it receives the gradient with respect to `alpha_flat`.
    pub fn cost_and_gradient(&self, alpha_flat: &[f64], grad: Option<&mut [f64]>) -> Result<f64> {
        if self.is_empty() {
            return Err(MixtureError::EmptyCurve);
        }
        if alpha_flat.len() != 2 * self.sub_num() {
            return Err(MixtureError::Configuration(format!(
                "{} logistic parameters for {} segments",
                alpha_flat.len(),
                self.sub_num()
            )));
        }
        let alpha = computation::alpha_from_flat(alpha_flat);
        let (values, lse) = computation::time_value(&self.times, &alpha);
        let mut cost = 0f64;
        for (s, segment) in self.segments.iter().enumerate() {
            for &i in segment.iter() {
                cost -= values[i][s] - lse[i];
            }
        }
        if let Some(grad) = grad {
            grad.iter_mut().for_each(|g| *g = 0f64);
            for (s, segment) in self.segments.iter().enumerate() {
                for &i in segment.iter() {
                    grad[2 * s] -= 1f64;
                    grad[2 * s + 1] -= self.times[i];
                }
            }
            for (i, &t) in self.times.iter().enumerate() {
                for s in 0..self.sub_num() {
                    let kappa = (values[i][s] - lse[i]).exp();
                    grad[2 * s] += kappa;
                    grad[2 * s + 1] += kappa * t;
                }
            }
        }
        Ok(cost)
    }
    /// Draw a curve at `times`: the segment from the logistic weights, then the value
    /// from the regression of that segment.
    pub fn sample<R: Rng>(
        times: Vec<f64>,
        alpha: &DMatrix<f64>,
        beta: &DMatrix<f64>,
        sd: &[f64],
        rng: &mut R,
    ) -> Result<Self> {
        let sub_num = alpha.nrows();
        let mut curve = Self::new(times.clone(), vec![0f64; times.len()], sub_num, beta.ncols())?;
        curve.check_parameters(alpha, beta, sd)?;
        curve.clear_segments();
        for (i, &t) in times.iter().enumerate() {
            let (kappa, _) = log_to_multi(&computation::log_kappa(t, alpha));
            let s = sample_categorical(rng, &kappa);
            let mean = curve.design.row(i).dot(&beta.row(s));
            let normal = Normal::new(mean, sd[s])
                .map_err(|e| MixtureError::NumericFailure(format!("{e}")))?;
            curve.values[i] = normal.sample(rng);
            curve.segments[s].insert(i);
        }
        Ok(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    fn two_lines() -> Curve {
        let times: Vec<_> = (0..6).map(|t| t as f64).collect();
        let values = vec![0f64, 1.1, 1.9, 10f64, 9.1, 7.9];
        Curve::new(times, values, 2, 2).unwrap()
    }
    fn assert_cover(curve: &Curve) {
        let mut seen = vec![0; curve.len()];
        for segment in curve.segments() {
            for &i in segment {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&x| x == 1), "{:?}", curve.segments());
    }
    fn parameters() -> (DMatrix<f64>, DMatrix<f64>, Vec<f64>) {
        let alpha = computation::alpha_from_flat(&[0f64, 0f64, -12.5, 5f64]);
        let beta = DMatrix::from_row_slice(2, 2, &[0f64, 1f64, 16f64, -2f64]);
        (alpha, beta, vec![0.5, 0.5])
    }
    #[test]
    fn set_value() {
        let mut curve = two_lines();
        curve.set_value_at(5, 6f64, 1f64).unwrap();
        assert_eq!(curve.times()[5], 6f64);
        assert!(matches!(
            curve.set_value_at(6, 0f64, 0f64),
            Err(MixtureError::IndexOutOfRange { index: 6, len: 6 })
        ));
        assert!(curve.set_values(vec![0f64], vec![], vec![]).is_err());
        curve.set_size(3, 2).unwrap();
        assert_eq!(curve.len(), 3);
        assert_eq!(curve.sub_num(), 2);
        assert!(Curve::new(vec![0f64], vec![], 2, 2).is_err());
    }
    #[test]
    fn reject_no_segment() {
        let mut curve = two_lines();
        assert!(matches!(curve.set_size(3, 0), Err(MixtureError::Configuration(_))));
        // The curve is untouched and still imputable.
        assert_eq!(curve.sub_num(), 2);
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(3);
        curve.impute_uniform(&mut rng).unwrap();
        assert!(curve.set_values(vec![0f64], vec![0f64], vec![]).is_err());
    }
    #[test]
    fn reject_bad_segments() {
        let mut curve = two_lines();
        let times = vec![0f64, 1f64, 2f64];
        let values = vec![0f64; 3];
        let outside = vec![BTreeSet::from([0, 1]), BTreeSet::from([7])];
        assert!(matches!(
            curve.set_values(times.clone(), values.clone(), outside),
            Err(MixtureError::IndexOutOfRange { index: 7, len: 3 })
        ));
        let twice = vec![BTreeSet::from([0, 1]), BTreeSet::from([1, 2])];
        assert!(matches!(
            curve.set_values(times.clone(), values.clone(), twice),
            Err(MixtureError::Configuration(_))
        ));
        // Rejected input leaves the previous contents.
        assert_eq!(curve.len(), 6);
        let valid = vec![BTreeSet::from([0, 1]), BTreeSet::from([2])];
        curve.set_values(times, values, valid).unwrap();
        curve.compute_design_matrix(2);
        let (alpha, beta, sd) = parameters();
        assert!(curve.completed_unchecked(&alpha, &beta, &sd).is_finite());
        assert_eq!(curve.labels(), vec![0, 0, 1]);
    }
    #[test]
    fn segment_cover() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(42);
        let mut curve = two_lines();
        let (alpha, beta, sd) = parameters();
        for _ in 0..20 {
            curve.impute_uniform(&mut rng).unwrap();
            assert_cover(&curve);
            curve.impute_by_quantile(&[0f64, 2.5, 5f64]).unwrap();
            assert_cover(&curve);
            curve.impute_by_quantile_mixing(&[0f64, 2.5, 5f64], &mut rng).unwrap();
            assert_cover(&curve);
            curve.sample_segments(&alpha, &beta, &sd, &mut rng).unwrap();
            assert_cover(&curve);
            curve.impute_map(&alpha, &beta, &sd).unwrap();
            assert_cover(&curve);
        }
    }
    #[test]
    fn quantile_imputation() {
        let mut curve = two_lines();
        curve.impute_by_quantile(&[0f64, 2.5, 5f64]).unwrap();
        assert_eq!(curve.labels(), vec![0, 0, 0, 1, 1, 1]);
        let times: Vec<_> = (1..=10).map(|t| t as f64).collect();
        let mut curve = Curve::new(times, vec![0f64; 10], 3, 1).unwrap();
        let breaks = curve.compute_quantile_breaks().unwrap();
        assert_eq!(breaks, vec![1f64, 4f64, 7f64, 10f64]);
        curve.impute_by_quantile(&breaks).unwrap();
        // 4 equals the first interior break and falls back to segment 0.
        assert_eq!(curve.labels(), vec![0, 0, 0, 0, 1, 1, 1, 2, 2, 2]);
        assert!(curve.impute_by_quantile(&[0f64, 1f64]).is_err());
    }
    #[test]
    fn quantile_mixing_edges() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(42);
        let mut curve = two_lines();
        // Midpoints are 1.25 and 3.75.
        for _ in 0..20 {
            curve.impute_by_quantile_mixing(&[0f64, 2.5, 5f64], &mut rng).unwrap();
            let labels = curve.labels();
            assert_eq!(labels[0], 0);
            assert_eq!(labels[1], 0);
            assert_eq!(labels[4], 1);
            assert_eq!(labels[5], 1);
        }
    }
    #[test]
    fn likelihoods() {
        let mut curve = two_lines();
        let (alpha, beta, sd) = parameters();
        curve.impute_by_quantile(&[0f64, 2.5, 5f64]).unwrap();
        let joint = curve.joint_log_probability(&alpha, &beta, &sd).unwrap();
        assert_eq!(joint.shape(), (6, 2));
        let completed = curve.completed_log_likelihood(&alpha, &beta, &sd).unwrap();
        let observed = curve.observed_log_likelihood(&alpha, &beta, &sd).unwrap();
        assert!(completed <= observed + 1e-10, "{} {}", completed, observed);
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(42);
        curve.impute_uniform(&mut rng).unwrap();
        let completed = curve.completed_log_likelihood(&alpha, &beta, &sd).unwrap();
        assert!(completed <= observed + 1e-10, "{} {}", completed, observed);
        let stale = DMatrix::zeros(2, 3);
        assert!(curve.observed_log_likelihood(&alpha, &stale, &sd).is_err());
        let empty = Curve::new(vec![], vec![], 2, 2).unwrap();
        assert!(matches!(
            empty.observed_log_likelihood(&alpha, &beta, &sd),
            Err(MixtureError::EmptyCurve)
        ));
    }
    #[test]
    fn gradient_matches_finite_difference() {
        let mut curve = two_lines();
        curve.impute_by_quantile(&[0f64, 2.5, 5f64]).unwrap();
        let alpha = vec![0.3, -0.2, -1f64, 0.4];
        let mut grad = vec![0f64; 4];
        let cost = curve
            .cost_and_gradient(&alpha, Some(grad.as_mut_slice()))
            .unwrap();
        assert!(0f64 < cost);
        let eps = 1e-6;
        for p in 0..alpha.len() {
            let mut plus = alpha.clone();
            plus[p] += eps;
            let mut minus = alpha.clone();
            minus[p] -= eps;
            let diff = (curve.cost_and_gradient(&plus, None).unwrap()
                - curve.cost_and_gradient(&minus, None).unwrap())
                / (2f64 * eps);
            assert!((diff - grad[p]).abs() < 1e-4, "{} {} {}", p, diff, grad[p]);
        }
        assert!(curve.cost_and_gradient(&alpha[..2], None).is_err());
    }
    #[test]
    fn sample_curve() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(42);
        let (alpha, beta, sd) = parameters();
        let times: Vec<_> = (0..50).map(|t| t as f64 / 5f64).collect();
        let curve = Curve::sample(times, &alpha, &beta, &sd, &mut rng).unwrap();
        assert_eq!(curve.len(), 50);
        assert_cover(&curve);
        // Far from the switch point the segment is almost surely fixed.
        let labels = curve.labels();
        assert_eq!(labels[0], 0);
        assert_eq!(labels[49], 1);
    }
}
