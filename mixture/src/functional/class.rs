//! Parameters of the segmented regression in one cluster, and their update.
use super::computation::{alpha_from_flat, flat_from_alpha};
use super::curve::Curve;
use crate::error::{MixtureError, Result};
use crate::optimizer::Minimizer;
use definitions::FunctionalParameters;
use nalgebra::{DMatrix, DVector};

/// Smallest standard deviation of a segment.
pub const MIN_SD: f64 = 1e-4;
/// Curves with a smaller posterior weight do not take part in the update.
const MIN_WEIGHT: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct FunctionalClass {
    /// `nSub x 2` logistic weights. The first row is fixed to zero.
    alpha: DMatrix<f64>,
    /// `nSub x nCoeff` regression coefficients.
    beta: DMatrix<f64>,
    sd: Vec<f64>,
}

impl FunctionalClass {
    pub fn new(sub_num: usize, coeff_num: usize) -> Self {
        Self {
            alpha: DMatrix::zeros(sub_num, 2),
            beta: DMatrix::zeros(sub_num, coeff_num),
            sd: vec![1f64; sub_num],
        }
    }
    pub fn with_parameters(alpha: DMatrix<f64>, beta: DMatrix<f64>, sd: Vec<f64>) -> Result<Self> {
        let sub_num = alpha.nrows();
        if alpha.ncols() != 2 || beta.nrows() != sub_num || sd.len() != sub_num {
            return Err(MixtureError::Configuration(format!(
                "alpha {:?}, beta {:?}, and {} standard deviations",
                alpha.shape(),
                beta.shape(),
                sd.len()
            )));
        }
        if sd.iter().any(|&s| !(0f64 < s)) {
            return Err(MixtureError::Configuration(format!(
                "standard deviations should be positive:{:?}",
                sd
            )));
        }
        Ok(Self { alpha, beta, sd })
    }
    pub fn sub_num(&self) -> usize {
        self.alpha.nrows()
    }
    pub fn coeff_num(&self) -> usize {
        self.beta.ncols()
    }
    pub fn alpha(&self) -> &DMatrix<f64> {
        &self.alpha
    }
    pub fn beta(&self) -> &DMatrix<f64> {
        &self.beta
    }
    pub fn sd(&self) -> &[f64] {
        &self.sd
    }
    pub fn free_parameter_num(&self) -> usize {
        let sub_num = self.sub_num();
        2 * (sub_num - 1) + sub_num * self.coeff_num() + sub_num
    }
    pub fn parameters(&self) -> FunctionalParameters {
        let alpha = (0..self.sub_num())
            .map(|s| [self.alpha[(s, 0)], self.alpha[(s, 1)]])
            .collect();
        let beta = self
            .beta
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        FunctionalParameters {
            alpha,
            beta,
            sd: self.sd.clone(),
        }
    }
    /// Free logistic rows, then `beta` row by row, then `sd`.
    pub fn to_vector(&self) -> Vec<f64> {
        let alpha = flat_from_alpha(&self.alpha);
        let beta = self.beta.row_iter().flat_map(|row| row.iter().copied().collect::<Vec<_>>());
        alpha[2..]
            .iter()
            .copied()
            .chain(beta)
            .chain(self.sd.iter().copied())
            .collect()
    }
    pub fn vector_names(&self) -> Vec<String> {
        let sub_num = self.sub_num();
        let alpha = (1..sub_num).flat_map(|s| [format!("s: {s}, alpha0"), format!("s: {s}, alpha1")]);
        let beta = (0..sub_num)
            .flat_map(|s| (0..self.coeff_num()).map(move |c| format!("s: {s}, beta{c}")));
        let sd = (0..sub_num).map(|s| format!("s: {s}, sd"));
        alpha.chain(beta).chain(sd).collect()
    }
    /// Inverse of `to_vector`.
    pub fn set_from_vector(&mut self, params: &[f64]) -> Result<()> {
        let (sub_num, coeff_num) = (self.sub_num(), self.coeff_num());
        let alpha_len = 2 * (sub_num - 1);
        let beta_len = sub_num * coeff_num;
        if params.len() != alpha_len + beta_len + sub_num || params.iter().any(|x| !x.is_finite()) {
            return Err(MixtureError::Configuration(format!(
                "{} values do not fit {} segments and {} coefficients",
                params.len(),
                sub_num,
                coeff_num
            )));
        }
        let mut full = vec![0f64; 2 * sub_num];
        full[2..].copy_from_slice(&params[..alpha_len]);
        let alpha = alpha_from_flat(&full);
        let beta = DMatrix::from_row_slice(sub_num, coeff_num, &params[alpha_len..alpha_len + beta_len]);
        let sd = params[alpha_len + beta_len..].to_vec();
        *self = Self::with_parameters(alpha, beta, sd)?;
        Ok(())
    }
    pub fn ln_observed_probability(&self, curve: &Curve) -> f64 {
        curve.observed_unchecked(&self.alpha, &self.beta, &self.sd)
    }
    pub fn ln_completed_probability(&self, curve: &Curve) -> f64 {
        curve.completed_unchecked(&self.alpha, &self.beta, &self.sd)
    }
    /// Update every parameter from the curves weighted by their posterior
    /// probability of this cluster.
    pub fn m_step<M: Minimizer>(&mut self, curves: &[Curve], weights: &[f64], optimizer: &M) -> Result<()> {
        assert_eq!(curves.len(), weights.len());
        if let Some(curve) = curves.iter().find(|c| c.is_empty()) {
            debug!("FUNC\tEmptyCurve\t{:?}", curve);
            return Err(MixtureError::EmptyCurve);
        }
        self.m_step_alpha(curves, weights, optimizer);
        self.m_step_beta_sd(curves, weights);
        Ok(())
    }
    /// Logistic weights by minimizing the weighted cost of the current segments.
    /// On a numeric failure the previous weights are kept.
    fn m_step_alpha<M: Minimizer>(&mut self, curves: &[Curve], weights: &[f64], optimizer: &M) {
        let sub_num = self.sub_num();
        if sub_num < 2 {
            return;
        }
        let used: Vec<_> = curves
            .iter()
            .zip(weights.iter())
            .filter(|(_, &w)| MIN_WEIGHT < w)
            .collect();
        if used.is_empty() {
            return;
        }
        // The first segment is the reference, so only the other rows are free.
        let init = flat_from_alpha(&self.alpha)[2..].to_vec();
        let objective = |free: &[f64], grad: Option<&mut [f64]>| -> f64 {
            let mut full = vec![0f64; 2 * sub_num];
            full[2..].copy_from_slice(free);
            let mut buffer = vec![0f64; 2 * sub_num];
            let mut cost = 0f64;
            match grad {
                Some(grad) => {
                    grad.iter_mut().for_each(|g| *g = 0f64);
                    for &(curve, w) in used.iter() {
                        match curve.cost_and_gradient(&full, Some(buffer.as_mut_slice())) {
                            Ok(c) => cost += w * c,
                            Err(_) => return f64::NAN,
                        }
                        grad.iter_mut()
                            .zip(buffer[2..].iter())
                            .for_each(|(g, b)| *g += w * b);
                    }
                }
                None => {
                    for &(curve, w) in used.iter() {
                        match curve.cost_and_gradient(&full, None) {
                            Ok(c) => cost += w * c,
                            Err(_) => return f64::NAN,
                        }
                    }
                }
            }
            cost
        };
        match optimizer.minimize(objective, init) {
            Ok(min) => {
                trace!("FUNC\tAlpha\t{}\t{:.4}\t{}", min.iterations, min.cost, min.converged);
                let mut full = vec![0f64; 2 * sub_num];
                full[2..].copy_from_slice(&min.params);
                self.alpha = alpha_from_flat(&full);
            }
            Err(why) => warn!("FUNC\tAlpha\tKeepPrevious\t{}", why),
        }
    }
    /// Weighted least squares and residual deviation of each segment. A segment
    /// observed at fewer distinct times than coefficients keeps its previous fit.
    fn m_step_beta_sd(&mut self, curves: &[Curve], weights: &[f64]) {
        let coeff_num = self.coeff_num();
        for s in 0..self.sub_num() {
            let mut xtx = DMatrix::<f64>::zeros(coeff_num, coeff_num);
            let mut xty = DVector::<f64>::zeros(coeff_num);
            let mut total = 0f64;
            let mut distinct_times: Vec<f64> = vec![];
            for (curve, &w) in curves.iter().zip(weights.iter()) {
                if w <= MIN_WEIGHT {
                    continue;
                }
                for &i in curve.segments()[s].iter() {
                    let row = curve.design().row(i);
                    xtx += row.transpose() * row * w;
                    xty += row.transpose() * (w * curve.values()[i]);
                    total += w;
                    if distinct_times.len() < coeff_num && !distinct_times.contains(&curve.times()[i]) {
                        distinct_times.push(curve.times()[i]);
                    }
                }
            }
            if total <= MIN_WEIGHT {
                warn!("FUNC\tEmptySegment\t{}\tKeepPrevious", s);
                continue;
            }
            if distinct_times.len() < coeff_num {
                warn!(
                    "FUNC\tFewTimes\t{}\t{}\t{}\tKeepPrevious",
                    s,
                    distinct_times.len(),
                    coeff_num
                );
                continue;
            }
            let beta = match solve(xtx, &xty) {
                Some(beta) => beta,
                None => {
                    warn!("FUNC\tSingular\t{}\tKeepPrevious", s);
                    continue;
                }
            };
            let (residuals, ws): (Vec<_>, Vec<_>) = curves
                .iter()
                .zip(weights.iter())
                .filter(|&(_, &w)| MIN_WEIGHT < w)
                .flat_map(|(curve, &w)| {
                    let beta = &beta;
                    curve.segments()[s].iter().map(move |&i| {
                        let fitted = curve.design().row(i).transpose().dot(beta);
                        (curve.values()[i] - fitted, w)
                    })
                })
                .unzip();
            let sd = match crate::numeric::weighted_mean_var(&residuals, &ws) {
                Some((_, var)) if var.is_finite() => var.sqrt(),
                _ => 0f64,
            };
            if sd < MIN_SD {
                warn!("FUNC\tSmallSd\t{}\t{:.3e}\t{}", s, sd, MIN_SD);
            }
            self.beta.set_row(s, &beta.transpose());
            self.sd[s] = sd.max(MIN_SD);
        }
    }
}

/// Relative size of the smallest Cholesky pivot below which the system is treated as singular.
const PIVOT_RATIO: f64 = 1e-10;

/// Solve the normal equations. Cholesky first, SVD when the system is singular.
fn solve(xtx: DMatrix<f64>, xty: &DVector<f64>) -> Option<DVector<f64>> {
    let scale = xtx.diagonal().max();
    if let Some(chol) = xtx.clone().cholesky() {
        let pivot = chol.l_dirty().diagonal().map(|d| d * d).min();
        let beta = chol.solve(xty);
        if scale * PIVOT_RATIO < pivot && beta.iter().all(|b| b.is_finite()) {
            return Some(beta);
        }
    }
    let beta = xtx.svd(true, true).solve(xty, 1e-12).ok()?;
    beta.iter().all(|b| b.is_finite()).then(|| beta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Lbfgs;
    fn lines() -> Vec<Curve> {
        let times: Vec<_> = (0..6).map(|t| t as f64).collect();
        let values = vec![0f64, 1.1, 1.9, 10f64, 9.1, 7.9];
        let mut curve = Curve::new(times, values, 2, 2).unwrap();
        curve.impute_by_quantile(&[0f64, 2.5, 5f64]).unwrap();
        vec![curve]
    }
    #[test]
    fn free_parameters() {
        let class = FunctionalClass::new(3, 2);
        assert_eq!(class.free_parameter_num(), 4 + 6 + 3);
        assert_eq!(FunctionalClass::new(1, 3).free_parameter_num(), 4);
    }
    #[test]
    fn m_step_fits_segments() {
        let curves = lines();
        let mut class = FunctionalClass::new(2, 2);
        class.m_step(&curves, &[1f64], &Lbfgs::default()).unwrap();
        let beta = class.beta();
        assert!((beta[(0, 1)] - 0.95).abs() < 0.01, "{}", beta);
        assert!((beta[(1, 1)] + 1.05).abs() < 0.01, "{}", beta);
        assert!(class.sd().iter().all(|&s| MIN_SD <= s && s < 0.2), "{:?}", class.sd());
        // The first row stays the reference.
        assert_eq!(class.alpha()[(0, 0)], 0f64);
        assert_eq!(class.alpha()[(0, 1)], 0f64);
        // The switch is in (2, 3) and goes upward.
        let alpha = class.alpha();
        assert!(0f64 < alpha[(1, 1)], "{}", alpha);
        let switch = -alpha[(1, 0)] / alpha[(1, 1)];
        assert!(2f64 < switch && switch < 3f64, "{}", switch);
        let params = class.parameters();
        assert_eq!(params.alpha.len(), 2);
        assert_eq!(params.beta[1].len(), 2);
    }
    #[test]
    fn m_step_keeps_empty_segment() {
        let times: Vec<_> = (0..4).map(|t| t as f64).collect();
        let curves = vec![Curve::new(times, vec![1f64, 2f64, 3f64, 4f64], 2, 2).unwrap()];
        let mut class = FunctionalClass::new(2, 2);
        class.m_step(&curves, &[1f64], &Lbfgs::default()).unwrap();
        // Segment 1 has no point. Its parameters stay as they were.
        assert_eq!(class.beta()[(1, 0)], 0f64);
        assert_eq!(class.sd()[1], 1f64);
        assert!((class.beta()[(0, 1)] - 1f64).abs() < 0.0001);
        assert!((class.sd()[0] - MIN_SD).abs() < 1e-10);
    }
    #[test]
    fn too_few_times() {
        // Every point at the same time: a line is not identifiable.
        let curves = vec![Curve::new(vec![1f64; 3], vec![1f64, 2f64, 3f64], 1, 2).unwrap()];
        let mut class = FunctionalClass::new(1, 2);
        class.m_step(&curves, &[1f64], &Lbfgs::default()).unwrap();
        assert_eq!(class.beta()[(0, 0)], 0f64);
        assert_eq!(class.beta()[(0, 1)], 0f64);
        assert_eq!(class.sd()[0], 1f64);
        // A constant is.
        let mut class = FunctionalClass::new(1, 1);
        let curves = vec![Curve::new(vec![1f64; 3], vec![1f64, 2f64, 3f64], 1, 1).unwrap()];
        class.m_step(&curves, &[1f64], &Lbfgs::default()).unwrap();
        assert!((class.beta()[(0, 0)] - 2f64).abs() < 1e-10);
    }
    #[test]
    fn singular_normal_equations() {
        let xtx = DMatrix::from_row_slice(2, 2, &[3f64, 3f64, 3f64, 3f64]);
        let xty = DVector::from_vec(vec![6f64, 6f64]);
        // Minimum norm solution.
        let beta = solve(xtx, &xty).unwrap();
        assert!((beta[0] - 1f64).abs() < 1e-8, "{}", beta);
        assert!((beta[1] - 1f64).abs() < 1e-8, "{}", beta);
        let xtx = DMatrix::from_row_slice(2, 2, &[2f64, 0f64, 0f64, 4f64]);
        let beta = solve(xtx, &DVector::from_vec(vec![2f64, 2f64])).unwrap();
        assert!((beta[0] - 1f64).abs() < 1e-12 && (beta[1] - 0.5).abs() < 1e-12);
    }
    struct Failing;
    impl Minimizer for Failing {
        fn minimize<F>(&self, _: F, _: Vec<f64>) -> Result<crate::optimizer::Minimum>
        where
            F: FnMut(&[f64], Option<&mut [f64]>) -> f64,
        {
            Err(MixtureError::NumericFailure("line search".to_string()))
        }
    }
    #[test]
    fn optimizer_failure_keeps_alpha() {
        let curves = lines();
        let alpha = DMatrix::from_row_slice(2, 2, &[0f64, 0f64, -5f64, 2f64]);
        let beta = DMatrix::zeros(2, 2);
        let mut class = FunctionalClass::with_parameters(alpha.clone(), beta, vec![1f64; 2]).unwrap();
        class.m_step(&curves, &[1f64], &Failing).unwrap();
        assert_eq!(class.alpha(), &alpha);
        // The regression is still updated.
        assert!((class.beta()[(0, 1)] - 0.95).abs() < 0.01, "{}", class.beta());
    }
    #[test]
    fn vector() {
        let alpha = DMatrix::from_row_slice(2, 2, &[0f64, 0f64, -5f64, 2f64]);
        let beta = DMatrix::from_row_slice(2, 2, &[1f64, 2f64, 3f64, 4f64]);
        let class = FunctionalClass::with_parameters(alpha, beta, vec![0.5, 0.25]).unwrap();
        let flat = class.to_vector();
        assert_eq!(flat, vec![-5f64, 2f64, 1f64, 2f64, 3f64, 4f64, 0.5, 0.25]);
        assert_eq!(class.vector_names().len(), flat.len());
        assert_eq!(class.vector_names()[0], "s: 1, alpha0");
        let mut other = FunctionalClass::new(2, 2);
        other.set_from_vector(&flat).unwrap();
        assert_eq!(other.alpha(), class.alpha());
        assert_eq!(other.beta(), class.beta());
        assert_eq!(other.sd(), class.sd());
        assert!(other.set_from_vector(&flat[1..]).is_err());
    }
    #[test]
    fn with_parameters() {
        let alpha = DMatrix::zeros(2, 2);
        let beta = DMatrix::zeros(2, 3);
        assert!(FunctionalClass::with_parameters(alpha.clone(), beta.clone(), vec![1f64; 2]).is_ok());
        assert!(FunctionalClass::with_parameters(alpha.clone(), beta.clone(), vec![1f64; 3]).is_err());
        assert!(FunctionalClass::with_parameters(alpha, beta, vec![0f64; 2]).is_err());
    }
}
