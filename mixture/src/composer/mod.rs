//! The mixture composer: cluster proportions, posterior probabilities, hard
//! labels, and the steps of the EM family driven over the component families.
pub mod algorithm;
pub mod strategy;
pub use algorithm::Algorithm;
pub use strategy::Strategy;

use crate::error::{InitKind, MixtureError, Result};
use crate::models::{Component, MixtureModel};
use crate::numeric::{argmax, log_to_multi, pairwise_sum};
use crate::param_stat::ParamStat;
use crate::sampler::sample_categorical;
use definitions::ParameterStatistics;
use rand::Rng;
use rayon::prelude::*;

/// Smoothing constant of the entropy term in the ICL.
pub const ENTROPY_EPS: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    Created,
    Initialized,
    ParametersInitialized,
    Running,
    Converged,
    Failed,
}

#[derive(Debug, Clone)]
pub struct MixtureComposer {
    cluster_num: usize,
    individual_num: usize,
    components: Vec<Component>,
    proportions: Vec<f64>,
    posterior: Vec<Vec<f64>>,
    hard_label: Vec<usize>,
    cluster_count: Vec<f64>,
    ln_likelihood: f64,
    state: ComposerState,
    /// Parameters visited by the last stochastic run, one per component.
    param_stats: Vec<ParamStat>,
}

impl MixtureComposer {
    pub fn new(cluster_num: usize, components: Vec<Component>) -> Result<Self> {
        if cluster_num == 0 {
            return Err(MixtureError::Configuration(
                "the number of clusters should be positive".to_string(),
            ));
        }
        let individual_num = match components.first() {
            Some(c) => c.individual_num(),
            None => {
                return Err(MixtureError::Configuration(
                    "no variable to cluster".to_string(),
                ))
            }
        };
        if individual_num == 0 {
            return Err(MixtureError::Configuration(
                "no individual to cluster".to_string(),
            ));
        }
        for c in components.iter() {
            if c.individual_num() != individual_num || c.cluster_num() != cluster_num {
                return Err(MixtureError::Configuration(format!(
                    "{} has {} individuals and {} clusters, expected {} and {}",
                    c.name(),
                    c.individual_num(),
                    c.cluster_num(),
                    individual_num,
                    cluster_num
                )));
            }
        }
        let uniform = 1f64 / cluster_num as f64;
        let param_stats = vec![ParamStat::default(); components.len()];
        Ok(Self {
            cluster_num,
            individual_num,
            components,
            proportions: vec![uniform; cluster_num],
            posterior: vec![vec![uniform; cluster_num]; individual_num],
            hard_label: vec![0; individual_num],
            cluster_count: vec![individual_num as f64 * uniform; cluster_num],
            ln_likelihood: f64::NEG_INFINITY,
            state: ComposerState::Created,
            param_stats,
        })
    }
    pub fn cluster_num(&self) -> usize {
        self.cluster_num
    }
    pub fn individual_num(&self) -> usize {
        self.individual_num
    }
    pub fn components(&self) -> &[Component] {
        &self.components
    }
    pub fn components_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }
    pub fn proportions(&self) -> &[f64] {
        &self.proportions
    }
    pub fn posterior(&self) -> &[Vec<f64>] {
        &self.posterior
    }
    pub fn hard_label(&self) -> &[usize] {
        &self.hard_label
    }
    pub fn cluster_count(&self) -> &[f64] {
        &self.cluster_count
    }
    /// Log-likelihood cached by the last E-step.
    pub fn ln_likelihood(&self) -> f64 {
        self.ln_likelihood
    }
    pub fn state(&self) -> ComposerState {
        self.state
    }
    pub(crate) fn set_state(&mut self, state: ComposerState) {
        self.state = state;
    }
    /// Level of the confidence intervals in `parameter_statistics`.
    pub fn set_confidence_level(&mut self, level: f64) {
        self.param_stats.iter_mut().for_each(|s| s.set_level(level));
    }
    /// Store the current parameters of every component.
    pub fn sample_parameters(&mut self) {
        for (stat, component) in self.param_stats.iter_mut().zip(self.components.iter()) {
            stat.sample(component.parameter_vector());
        }
    }
    pub fn clear_parameter_samples(&mut self) {
        self.param_stats.iter_mut().for_each(|s| s.clear());
    }
    /// Median, lower and upper bound of the stored parameters of each component.
    pub fn parameter_statistics(&self) -> Vec<Option<ParameterStatistics>> {
        self.param_stats
            .iter()
            .zip(self.components.iter())
            .map(|(stat, component)| stat.statistics(component.parameter_names()))
            .collect()
    }
    /// Set every component to the median of its stored parameters, then refresh
    /// the posterior. Components without samples are left as they are.
    pub fn set_expectation_parameters(&mut self) -> Result<()> {
        let stats = self.parameter_statistics();
        for (component, stat) in self.components.iter_mut().zip(stats) {
            if let Some(stat) = stat {
                component.set_parameter_vector(&stat.median)?;
            }
        }
        self.e_step();
        Ok(())
    }
    /// Cluster parameters plus `K - 1` free proportions.
    pub fn free_parameter_num(&self) -> usize {
        let model: usize = self.components.iter().map(|c| c.free_parameter_num()).sum();
        self.cluster_num - 1 + model
    }
    /// Reset the proportions and the posterior to uniform, and impute every latent variable.
    pub fn initialize_step<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let uniform = 1f64 / self.cluster_num as f64;
        self.proportions.iter_mut().for_each(|p| *p = uniform);
        self.posterior
            .iter_mut()
            .for_each(|row| row.iter_mut().for_each(|p| *p = uniform));
        self.ln_likelihood = f64::NEG_INFINITY;
        self.p_step();
        self.update_cluster_count();
        for component in self.components.iter_mut() {
            component.initialize_latent(rng)?;
        }
        self.state = ComposerState::Initialized;
        Ok(())
    }
    pub fn random_class_init<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        if self.state == ComposerState::Created {
            self.initialize_step(rng)?;
        }
        for label in self.hard_label.iter_mut() {
            *label = sample_categorical(rng, &self.proportions);
        }
        let min_count = self.c_step();
        if min_count <= 0f64 {
            trace!("INIT\tClass\tFailed\t{:?}", self.cluster_count);
            return Err(MixtureError::DegenerateInitialization {
                kind: InitKind::RandomClass,
                min_count,
            });
        }
        self.m_step()?;
        self.e_step();
        self.state = ComposerState::ParametersInitialized;
        Ok(())
    }
    pub fn random_fuzzy_init<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        if self.state == ComposerState::Created {
            self.initialize_step(rng)?;
        }
        for row in self.posterior.iter_mut() {
            row.iter_mut()
                .zip(self.proportions.iter())
                .for_each(|(p, prop)| *p = prop * rng.gen::<f64>());
            let sum: f64 = row.iter().sum();
            if 0f64 < sum {
                row.iter_mut().for_each(|p| *p /= sum);
            }
        }
        self.update_cluster_count();
        let min_count = self.min_cluster_count();
        if min_count <= 0f64 {
            trace!("INIT\tFuzzy\tFailed\t{:?}", self.cluster_count);
            return Err(MixtureError::DegenerateInitialization {
                kind: InitKind::RandomFuzzy,
                min_count,
            });
        }
        self.map_step();
        self.m_step()?;
        self.e_step();
        self.state = ComposerState::ParametersInitialized;
        Ok(())
    }
    fn update_cluster_count(&mut self) {
        for k in 0..self.cluster_num {
            let column: Vec<_> = self.posterior.iter().map(|row| row[k]).collect();
            self.cluster_count[k] = pairwise_sum(&column);
        }
    }
    fn min_cluster_count(&self) -> f64 {
        self.cluster_count
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
    /// Harden the posterior from the labels. Returns the smallest cluster count.
    pub fn c_step(&mut self) -> f64 {
        for (row, &label) in self.posterior.iter_mut().zip(self.hard_label.iter()) {
            row.iter_mut().for_each(|p| *p = 0f64);
            row[label] = 1f64;
        }
        self.update_cluster_count();
        self.min_cluster_count()
    }
    /// Sample the labels from the posterior, then harden.
    pub fn s_step<R: Rng>(&mut self, rng: &mut R) -> f64 {
        for (label, row) in self.hard_label.iter_mut().zip(self.posterior.iter()) {
            *label = sample_categorical(rng, row);
        }
        self.c_step()
    }
    /// Log probability of individual `i` in each cluster, written into `buffer`.
    fn ln_component_probability(&self, i: usize, buffer: &mut [f64]) {
        for (k, slot) in buffer.iter_mut().enumerate() {
            let ln_prop = self.proportions[k].ln();
            *slot = ln_prop
                + self
                    .components
                    .iter()
                    .map(|c| c.ln_observed_probability(i, k))
                    .sum::<f64>();
        }
    }
    /// Posterior probabilities, MAP labels, and the log-likelihood. Returns the smallest cluster count.
    pub fn e_step(&mut self) -> f64 {
        let cluster_num = self.cluster_num;
        let this = &*self;
        let rows: Vec<(Vec<f64>, usize, f64)> = (0..self.individual_num)
            .into_par_iter()
            .map_init(
                || vec![0f64; cluster_num],
                |buffer, i| {
                    this.ln_component_probability(i, buffer);
                    let label = argmax(buffer);
                    let (posterior, lk) = log_to_multi(buffer);
                    (posterior, label, lk)
                },
            )
            .collect();
        let mut lks = Vec::with_capacity(rows.len());
        for (i, (posterior, label, lk)) in rows.into_iter().enumerate() {
            self.posterior[i] = posterior;
            self.hard_label[i] = label;
            lks.push(lk);
        }
        self.ln_likelihood = pairwise_sum(&lks);
        self.update_cluster_count();
        self.min_cluster_count()
    }
    /// Proportions from the posterior.
    pub fn p_step(&mut self) {
        let n = self.individual_num as f64;
        for k in 0..self.cluster_num {
            let column: Vec<_> = self.posterior.iter().map(|row| row[k]).collect();
            self.proportions[k] = pairwise_sum(&column) / n;
        }
    }
    pub fn m_step(&mut self) -> Result<()> {
        self.p_step();
        let posterior = &self.posterior;
        for component in self.components.iter_mut() {
            component.m_step(posterior)?;
        }
        Ok(())
    }
    pub fn map_step(&mut self) {
        for (label, row) in self.hard_label.iter_mut().zip(self.posterior.iter()) {
            *label = argmax(row);
        }
    }
    pub fn imputation_step(&mut self) -> Result<()> {
        let labels = &self.hard_label;
        for component in self.components.iter_mut() {
            component.imputation_step(labels)?;
        }
        Ok(())
    }
    pub fn sampling_step<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let labels = &self.hard_label;
        for component in self.components.iter_mut() {
            component.sampling_step(labels, rng)?;
        }
        Ok(())
    }
    /// Log-likelihood of individual `i`, computed from scratch.
    pub fn compute_ln_likelihood_of(&self, i: usize) -> f64 {
        let mut buffer = vec![0f64; self.cluster_num];
        self.ln_component_probability(i, &mut buffer);
        crate::numeric::logsumexp(&buffer)
    }
    /// Log-likelihood of every individual, computed from scratch.
    pub fn compute_ln_likelihood(&self) -> f64 {
        let lks: Vec<_> = (0..self.individual_num)
            .into_par_iter()
            .map(|i| self.compute_ln_likelihood_of(i))
            .collect();
        pairwise_sum(&lks)
    }
    pub fn compute_icl(&self) -> f64 {
        let n = self.individual_num as f64;
        let entropy: f64 = self
            .posterior
            .iter()
            .flat_map(|row| row.iter())
            .map(|&t| t * (t + ENTROPY_EPS).ln())
            .sum();
        -2f64 * self.ln_likelihood + self.free_parameter_num() as f64 * n.ln() - 2f64 * entropy
    }
}
