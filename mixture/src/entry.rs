use crate::composer::{MixtureComposer, Strategy};
use crate::config::ClusteringConfig;
use crate::error::{MixtureError, Result};
use crate::models::{Component, MixtureModel};
use crate::optimizer::Lbfgs;
use definitions::{Assignment, DataSet, VariableParameters};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

pub trait MixtureClustering {
    /// Cluster the individuals and write the assignments, the proportions,
    /// the likelihood, the ICL, and the parameters back.
    fn cluster_mixture(&mut self, config: &ClusteringConfig) -> Result<()>;
}

/// A composer over every variable of `ds`.
pub fn build_composer(ds: &DataSet, config: &ClusteringConfig) -> Result<MixtureComposer> {
    if let Some(var) = ds.variables.iter().find(|v| v.len() != ds.individual_num) {
        return Err(MixtureError::Configuration(format!(
            "{} has {} observations, but there are {} individuals",
            var.name,
            var.len(),
            ds.individual_num
        )));
    }
    if !(0f64 < config.confidence_level && config.confidence_level < 1f64) {
        return Err(MixtureError::Configuration(format!(
            "the confidence level should be in (0, 1), not {}",
            config.confidence_level
        )));
    }
    let optimizer = Lbfgs {
        iter_max: config.optim_iter_max,
        ..Default::default()
    };
    let components = ds
        .variables
        .iter()
        .map(|var| Component::from_variable(var, config.cluster_num, optimizer))
        .collect::<Result<Vec<_>>>()?;
    let mut composer = MixtureComposer::new(config.cluster_num, components)?;
    composer.set_confidence_level(config.confidence_level);
    Ok(composer)
}

impl MixtureClustering for DataSet {
    fn cluster_mixture(&mut self, config: &ClusteringConfig) -> Result<()> {
        let template = build_composer(self, config)?;
        debug!(
            "CLUSTER\t{}\t{}\t{}\t{}",
            self.individual_num,
            self.variables.len(),
            config.cluster_num,
            config.algorithm
        );
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(config.seed);
        let strategy = Strategy::from_config(config);
        let composer = strategy.run(&template, &mut rng)?;
        let icl = composer.compute_icl();
        debug!("CLUSTER\tLK\t{:.4}\tICL\t{:.4}", composer.ln_likelihood(), icl);
        self.clear_results();
        self.assignments = composer
            .posterior()
            .iter()
            .zip(composer.hard_label())
            .enumerate()
            .map(|(id, (posterior, &cluster))| Assignment::new(id as u64, cluster, posterior.clone()))
            .collect();
        self.proportions = composer.proportions().to_vec();
        self.parameters = composer
            .components()
            .iter()
            .zip(composer.parameter_statistics())
            .map(|(c, statistics)| VariableParameters {
                name: c.name().to_string(),
                parameters: c.parameters(),
                statistics,
            })
            .collect();
        self.ln_likelihood = Some(composer.ln_likelihood());
        self.icl = Some(icl);
        Ok(())
    }
}
