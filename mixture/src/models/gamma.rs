use super::augmented::AugmentedData;
use super::{column, MixtureModel};
use crate::error::{MixtureError, Result};
use crate::numeric::trigamma;
use definitions::Parameters;
use rand::Rng;
use rand_distr::Distribution;
use statrs::function::gamma::{digamma, ln_gamma};

const NEWTON_ITER: usize = 100;
const NEWTON_TOL: f64 = 1e-10;
const MIN_SHAPE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct GammaMixture {
    name: String,
    data: AugmentedData,
    /// Logarithm of `data.values()`, refreshed whenever a missing entry is imputed.
    ln_data: Vec<f64>,
    shape: Vec<f64>,
    scale: Vec<f64>,
}

impl GammaMixture {
    pub fn new(name: &str, data: &[f64], cluster_num: usize) -> Result<Self> {
        let data: Vec<_> = data.iter().copied().map(Some).collect();
        Self::with_missing(name, &data, cluster_num)
    }
    pub fn with_missing(name: &str, data: &[Option<f64>], cluster_num: usize) -> Result<Self> {
        let data = AugmentedData::new(name, data, |x| x.is_finite() && 0f64 < x)?;
        Ok(Self {
            name: name.to_string(),
            ln_data: data.values().iter().map(|x| x.ln()).collect(),
            data,
            shape: vec![1f64; cluster_num],
            scale: vec![1f64; cluster_num],
        })
    }
    pub fn shape(&self) -> &[f64] {
        &self.shape
    }
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
    pub fn data(&self) -> &AugmentedData {
        &self.data
    }
    fn impute(&mut self, i: usize, x: f64) {
        self.data.impute(i, x);
        self.ln_data[i] = x.ln();
    }
}

/// Solve `ln a - digamma(a) = target` by Newton's method.
fn newton_shape(target: f64) -> Result<f64> {
    if !(target.is_finite() && 0f64 < target) {
        return Err(MixtureError::NumericFailure(format!(
            "no shape solves ln(a) - digamma(a) = {}",
            target
        )));
    }
    // Closed-form approximation as the starting point.
    let mut a = (3f64 - target + ((target - 3f64).powi(2) + 24f64 * target).sqrt()) / (12f64 * target);
    for _ in 0..NEWTON_ITER {
        let f = a.ln() - digamma(a) - target;
        let df = 1f64 / a - trigamma(a);
        let mut next = a - f / df;
        if next <= 0f64 {
            next = a / 2f64;
        }
        if !next.is_finite() {
            break;
        }
        if (next - a).abs() < NEWTON_TOL * a {
            return Ok(next);
        }
        a = next;
    }
    Err(MixtureError::NumericFailure(format!(
        "Newton's method did not converge for target {}",
        target
    )))
}

impl MixtureModel for GammaMixture {
    fn name(&self) -> &str {
        &self.name
    }
    fn individual_num(&self) -> usize {
        self.data.len()
    }
    fn cluster_num(&self) -> usize {
        self.shape.len()
    }
    fn free_parameter_num(&self) -> usize {
        2 * self.shape.len()
    }
    fn ln_observed_probability(&self, i: usize, k: usize) -> f64 {
        match self.data.is_missing(i) {
            true => 0f64,
            false => self.ln_completed_probability(i, k),
        }
    }
    fn ln_completed_probability(&self, i: usize, k: usize) -> f64 {
        let (a, b) = (self.shape[k], self.scale[k]);
        (a - 1f64) * self.ln_data[i] - self.data.values()[i] / b - ln_gamma(a) - a * b.ln()
    }
    fn initialize_latent<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.data.remove_missing(rng);
        for i in self.data.missing().to_vec() {
            self.ln_data[i] = self.data.values()[i].ln();
        }
        Ok(())
    }
    fn sampling_step<R: Rng>(&mut self, labels: &[usize], rng: &mut R) -> Result<()> {
        for i in self.data.missing().to_vec() {
            let k = labels[i];
            let gamma = rand_distr::Gamma::new(self.shape[k], self.scale[k])
                .map_err(|e| MixtureError::NumericFailure(format!("{}: {}", self.name, e)))?;
            // Draws may underflow to zero for tiny shapes.
            let x = gamma.sample(rng).max(f64::MIN_POSITIVE);
            self.impute(i, x);
        }
        Ok(())
    }
    fn imputation_step(&mut self, labels: &[usize]) -> Result<()> {
        for i in self.data.missing().to_vec() {
            let k = labels[i];
            self.impute(i, self.shape[k] * self.scale[k]);
        }
        Ok(())
    }
    /// Shape by Newton's method. When it fails, the moment estimator is used instead.
    fn m_step(&mut self, posterior: &[Vec<f64>]) -> Result<()> {
        for k in 0..self.shape.len() {
            let weights = column(posterior, k);
            let total: f64 = weights.iter().sum();
            if !(0f64 < total) {
                warn!("GAMMA\t{}\t{}\tEmptyCluster", self.name, k);
                continue;
            }
            let mean = self.data.values().iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / total;
            let mean_ln = self.ln_data.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / total;
            let shape = match newton_shape(mean.ln() - mean_ln) {
                Ok(shape) => shape,
                Err(why) => {
                    let var = self
                        .data
                        .values()
                        .iter()
                        .zip(&weights)
                        .map(|(x, w)| w * (x - mean).powi(2))
                        .sum::<f64>()
                        / total;
                    let moment = mean * mean / var;
                    if !(moment.is_finite() && 0f64 < moment) {
                        return Err(MixtureError::NumericFailure(format!(
                            "{}: cluster {} has mean {} and variance {}",
                            self.name, k, mean, var
                        )));
                    }
                    warn!("GAMMA\t{}\t{}\tMoment\t{}", self.name, k, why);
                    moment
                }
            };
            self.shape[k] = shape.max(MIN_SHAPE);
            self.scale[k] = mean / self.shape[k];
        }
        trace!("GAMMA\t{}\t{:?}\t{:?}", self.name, self.shape, self.scale);
        Ok(())
    }
    fn parameters(&self) -> Parameters {
        Parameters::Gamma {
            shape: self.shape.clone(),
            scale: self.scale.clone(),
        }
    }
    fn parameter_vector(&self) -> Vec<f64> {
        self.shape
            .iter()
            .zip(self.scale.iter())
            .flat_map(|(&a, &b)| [a, b])
            .collect()
    }
    fn parameter_names(&self) -> Vec<String> {
        (0..self.shape.len())
            .flat_map(|k| [format!("k: {k}, shape"), format!("k: {k}, scale")])
            .collect()
    }
    fn set_parameter_vector(&mut self, params: &[f64]) -> Result<()> {
        let valid = |x: &f64| x.is_finite() && 0f64 < *x;
        if params.len() != 2 * self.shape.len() || !params.iter().all(valid) {
            return Err(MixtureError::Configuration(format!(
                "{}: {:?} are not Gamma parameters",
                self.name, params
            )));
        }
        for (k, pair) in params.chunks_exact(2).enumerate() {
            self.shape[k] = pair[0].max(MIN_SHAPE);
            self.scale[k] = pair[1];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Gamma};
    use rand_xoshiro::Xoshiro256StarStar;
    #[test]
    fn newton() {
        for &a in &[0.3, 1f64, 2.5, 40f64] {
            let target = f64::ln(a) - digamma(a);
            let shape = newton_shape(target).unwrap();
            assert!((shape - a).abs() < 1e-6 * a, "{} {}", shape, a);
        }
        assert!(newton_shape(0f64).is_err());
        assert!(newton_shape(f64::NAN).is_err());
    }
    #[test]
    fn m_step() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(24);
        let gamma = Gamma::new(4f64, 2f64).unwrap();
        let data: Vec<f64> = (0..5000).map(|_| gamma.sample(&mut rng)).collect();
        let mut model = GammaMixture::new("y", &data, 1).unwrap();
        let posterior = vec![vec![1f64]; data.len()];
        model.m_step(&posterior).unwrap();
        assert!((model.shape()[0] - 4f64).abs() < 0.3, "{:?}", model.shape());
        assert!((model.scale()[0] - 2f64).abs() < 0.2, "{:?}", model.scale());
    }
    #[test]
    fn moment_fallback() {
        // All values equal: Newton has no root and the variance is zero.
        let mut model = GammaMixture::new("y", &[2f64, 2f64], 1).unwrap();
        let posterior = vec![vec![1f64]; 2];
        assert!(matches!(
            model.m_step(&posterior),
            Err(MixtureError::NumericFailure(_))
        ));
        assert!(GammaMixture::new("y", &[0f64], 1).is_err());
    }
    #[test]
    fn moment_estimator_takes_over() {
        // Nearly constant data: ln(mean) - mean(ln) is lost in rounding, so Newton
        // has no usable target while the variance is still positive.
        let data = [2f64, 2f64 + 1e-13, 2f64 - 1e-13];
        let mut model = GammaMixture::new("y", &data, 1).unwrap();
        let posterior = vec![vec![1f64]; data.len()];
        model.m_step(&posterior).unwrap();
        let mean = data.iter().sum::<f64>() / 3f64;
        let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 3f64;
        let moment = mean * mean / var;
        let shape = model.shape()[0];
        assert!(shape.is_finite() && 1e20 < shape, "{}", shape);
        assert!((shape - moment).abs() < 1e-6 * moment, "{} {}", shape, moment);
        assert!((shape * model.scale()[0] - mean).abs() < 1e-9);
    }
    #[test]
    fn missing_values() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(9);
        let data = vec![Some(1f64), None, Some(3f64), Some(5f64)];
        let mut model = GammaMixture::with_missing("y", &data, 1).unwrap();
        model.initialize_latent(&mut rng).unwrap();
        let x = model.data().values()[1];
        assert!((1f64..=5f64).contains(&x));
        assert_eq!(model.ln_observed_probability(1, 0), 0f64);
        let posterior = vec![vec![1f64]; 4];
        model.m_step(&posterior).unwrap();
        let labels = vec![0; 4];
        model.imputation_step(&labels).unwrap();
        let expected = model.shape()[0] * model.scale()[0];
        assert!((model.data().values()[1] - expected).abs() < 1e-12);
        let completed = model.ln_completed_probability(1, 0);
        assert!(completed.is_finite());
        for _ in 0..20 {
            model.sampling_step(&labels, &mut rng).unwrap();
            assert!(0f64 < model.data().values()[1]);
            assert_eq!(model.data().values()[3], 5f64);
        }
    }
    #[test]
    fn parameter_vector() {
        let mut model = GammaMixture::new("y", &[1f64, 2f64], 2).unwrap();
        model.set_parameter_vector(&[2f64, 0.5, 3f64, 1f64]).unwrap();
        assert_eq!(model.shape(), &[2f64, 3f64]);
        assert_eq!(model.scale(), &[0.5, 1f64]);
        assert_eq!(model.parameter_vector(), vec![2f64, 0.5, 3f64, 1f64]);
        assert!(model.set_parameter_vector(&[2f64, -1f64, 3f64, 1f64]).is_err());
    }
}
