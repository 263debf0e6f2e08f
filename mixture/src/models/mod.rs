//! Component families. Every family keeps the observations of one variable
//! and one parameter set per cluster.
pub mod augmented;
pub mod gamma;
pub mod gaussian;
pub use gamma::GammaMixture;
pub use gaussian::GaussianMixture;

use crate::error::{MixtureError, Result};
use crate::functional::FunctionalMixture;
use crate::optimizer::Lbfgs;
use definitions::{ModelType, Parameters, Variable, VariableData};
use rand::Rng;

pub trait MixtureModel {
    fn name(&self) -> &str;
    fn individual_num(&self) -> usize;
    fn cluster_num(&self) -> usize;
    fn free_parameter_num(&self) -> usize;
    /// Log probability of individual `i` under cluster `k`, latent variables marginalized.
    fn ln_observed_probability(&self, i: usize, k: usize) -> f64;
    /// Log probability of individual `i` under cluster `k` with the current latent variables.
    fn ln_completed_probability(&self, i: usize, k: usize) -> f64;
    /// Impute latent variables before any parameter exists.
    fn initialize_latent<R: Rng>(&mut self, rng: &mut R) -> Result<()>;
    /// Sample latent variables under the parameters of each individual's cluster.
    fn sampling_step<R: Rng>(&mut self, labels: &[usize], rng: &mut R) -> Result<()>;
    /// Impute latent variables by their most probable values.
    fn imputation_step(&mut self, labels: &[usize]) -> Result<()>;
    fn m_step(&mut self, posterior: &[Vec<f64>]) -> Result<()>;
    fn parameters(&self) -> Parameters;
    /// Parameters flattened cluster by cluster, in the order of `parameter_names`.
    fn parameter_vector(&self) -> Vec<f64>;
    fn parameter_names(&self) -> Vec<String>;
    fn set_parameter_vector(&mut self, params: &[f64]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum Component {
    Gaussian(GaussianMixture),
    Gamma(GammaMixture),
    Functional(FunctionalMixture),
}

impl Component {
    pub fn from_variable(variable: &Variable, cluster_num: usize, optimizer: Lbfgs) -> Result<Self> {
        let name = variable.name.as_str();
        match (&variable.model, &variable.data) {
            (ModelType::Gaussian, VariableData::Real(xs)) => {
                GaussianMixture::with_missing(name, xs, cluster_num).map(Component::Gaussian)
            }
            (ModelType::Gamma, VariableData::Real(xs)) => {
                GammaMixture::with_missing(name, xs, cluster_num).map(Component::Gamma)
            }
            (
                &ModelType::Functional { sub_num, coeff_num },
                VariableData::Functional(curves),
            ) => FunctionalMixture::new(name, curves, cluster_num, sub_num, coeff_num, optimizer)
                .map(Component::Functional),
            (model, _) => Err(MixtureError::Configuration(format!(
                "{}: the data do not fit the {} model",
                name, model
            ))),
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $model:ident => $body:expr) => {
        match $self {
            Component::Gaussian($model) => $body,
            Component::Gamma($model) => $body,
            Component::Functional($model) => $body,
        }
    };
}

impl MixtureModel for Component {
    fn name(&self) -> &str {
        dispatch!(self, m => m.name())
    }
    fn individual_num(&self) -> usize {
        dispatch!(self, m => m.individual_num())
    }
    fn cluster_num(&self) -> usize {
        dispatch!(self, m => m.cluster_num())
    }
    fn free_parameter_num(&self) -> usize {
        dispatch!(self, m => m.free_parameter_num())
    }
    fn ln_observed_probability(&self, i: usize, k: usize) -> f64 {
        dispatch!(self, m => m.ln_observed_probability(i, k))
    }
    fn ln_completed_probability(&self, i: usize, k: usize) -> f64 {
        dispatch!(self, m => m.ln_completed_probability(i, k))
    }
    fn initialize_latent<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        dispatch!(self, m => m.initialize_latent(rng))
    }
    fn sampling_step<R: Rng>(&mut self, labels: &[usize], rng: &mut R) -> Result<()> {
        dispatch!(self, m => m.sampling_step(labels, rng))
    }
    fn imputation_step(&mut self, labels: &[usize]) -> Result<()> {
        dispatch!(self, m => m.imputation_step(labels))
    }
    fn m_step(&mut self, posterior: &[Vec<f64>]) -> Result<()> {
        dispatch!(self, m => m.m_step(posterior))
    }
    fn parameters(&self) -> Parameters {
        dispatch!(self, m => m.parameters())
    }
    fn parameter_vector(&self) -> Vec<f64> {
        dispatch!(self, m => m.parameter_vector())
    }
    fn parameter_names(&self) -> Vec<String> {
        dispatch!(self, m => m.parameter_names())
    }
    fn set_parameter_vector(&mut self, params: &[f64]) -> Result<()> {
        dispatch!(self, m => m.set_parameter_vector(params))
    }
}

/// Weights of cluster `k` from the posterior matrix.
pub(crate) fn column(posterior: &[Vec<f64>], k: usize) -> Vec<f64> {
    posterior.iter().map(|row| row[k]).collect()
}
