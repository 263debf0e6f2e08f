use super::augmented::AugmentedData;
use super::{column, MixtureModel};
use crate::error::{MixtureError, Result};
use crate::numeric::{normal_log_pdf, weighted_mean_var};
use definitions::Parameters;
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub const MIN_SD: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct GaussianMixture {
    name: String,
    data: AugmentedData,
    mean: Vec<f64>,
    sd: Vec<f64>,
}

impl GaussianMixture {
    pub fn new(name: &str, data: &[f64], cluster_num: usize) -> Result<Self> {
        let data: Vec<_> = data.iter().copied().map(Some).collect();
        Self::with_missing(name, &data, cluster_num)
    }
    /// `None` marks a missing observation.
    pub fn with_missing(name: &str, data: &[Option<f64>], cluster_num: usize) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            data: AugmentedData::new(name, data, f64::is_finite)?,
            mean: vec![0f64; cluster_num],
            sd: vec![1f64; cluster_num],
        })
    }
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }
    pub fn sd(&self) -> &[f64] {
        &self.sd
    }
    pub fn data(&self) -> &AugmentedData {
        &self.data
    }
}

impl MixtureModel for GaussianMixture {
    fn name(&self) -> &str {
        &self.name
    }
    fn individual_num(&self) -> usize {
        self.data.len()
    }
    fn cluster_num(&self) -> usize {
        self.mean.len()
    }
    fn free_parameter_num(&self) -> usize {
        2 * self.mean.len()
    }
    /// A missing observation is integrated out.
    fn ln_observed_probability(&self, i: usize, k: usize) -> f64 {
        match self.data.is_missing(i) {
            true => 0f64,
            false => normal_log_pdf(self.data.values()[i], self.mean[k], self.sd[k]),
        }
    }
    fn ln_completed_probability(&self, i: usize, k: usize) -> f64 {
        normal_log_pdf(self.data.values()[i], self.mean[k], self.sd[k])
    }
    fn initialize_latent<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.data.remove_missing(rng);
        Ok(())
    }
    fn sampling_step<R: Rng>(&mut self, labels: &[usize], rng: &mut R) -> Result<()> {
        for i in self.data.missing().to_vec() {
            let k = labels[i];
            let normal = Normal::new(self.mean[k], self.sd[k])
                .map_err(|e| MixtureError::NumericFailure(format!("{}: {}", self.name, e)))?;
            self.data.impute(i, normal.sample(rng));
        }
        Ok(())
    }
    fn imputation_step(&mut self, labels: &[usize]) -> Result<()> {
        for i in self.data.missing().to_vec() {
            self.data.impute(i, self.mean[labels[i]]);
        }
        Ok(())
    }
    fn m_step(&mut self, posterior: &[Vec<f64>]) -> Result<()> {
        for k in 0..self.mean.len() {
            let weights = column(posterior, k);
            match weighted_mean_var(self.data.values(), &weights) {
                Some((mean, var)) => {
                    self.mean[k] = mean;
                    self.sd[k] = var.sqrt().max(MIN_SD);
                }
                None => warn!("GAUSS\t{}\t{}\tEmptyCluster", self.name, k),
            }
        }
        trace!("GAUSS\t{}\t{:?}\t{:?}", self.name, self.mean, self.sd);
        Ok(())
    }
    fn parameters(&self) -> Parameters {
        Parameters::Gaussian {
            mean: self.mean.clone(),
            sd: self.sd.clone(),
        }
    }
    fn parameter_vector(&self) -> Vec<f64> {
        self.mean
            .iter()
            .zip(self.sd.iter())
            .flat_map(|(&m, &s)| [m, s])
            .collect()
    }
    fn parameter_names(&self) -> Vec<String> {
        (0..self.mean.len())
            .flat_map(|k| [format!("k: {k}, mean"), format!("k: {k}, sd")])
            .collect()
    }
    fn set_parameter_vector(&mut self, params: &[f64]) -> Result<()> {
        if params.len() != 2 * self.mean.len() || params.iter().any(|x| !x.is_finite()) {
            return Err(MixtureError::Configuration(format!(
                "{}: {:?} are not Gaussian parameters",
                self.name, params
            )));
        }
        for (k, pair) in params.chunks_exact(2).enumerate() {
            self.mean[k] = pair[0];
            self.sd[k] = pair[1].max(MIN_SD);
        }
        Ok(())
    }
}
