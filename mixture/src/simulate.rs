//! Synthetic datasets drawn from known clusters.
use crate::error::{MixtureError, Result};
use crate::functional::{computation::alpha_from_flat, Curve};
use definitions::{Assignment, DataSet, ModelType, Variable, VariableData};
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub individual_num: usize,
    /// Time points of each curve.
    pub time_num: usize,
    /// Times are drawn uniformly in `[0, time_max]`.
    pub time_max: f64,
    /// Probability that a scalar observation is dropped.
    pub missing_rate: f64,
}

impl std::default::Default for SimulationConfig {
    fn default() -> Self {
        Self {
            individual_num: 100,
            time_num: 30,
            time_max: 10f64,
            missing_rate: 0f64,
        }
    }
}

/// Parameters of one simulated cluster.
#[derive(Debug, Clone)]
struct Truth {
    mean: f64,
    sd: f64,
    shape: f64,
    scale: f64,
    alpha: Vec<f64>,
    beta: Vec<f64>,
    curve_sd: Vec<f64>,
}

fn truths() -> Vec<Truth> {
    vec![
        Truth {
            mean: -2f64,
            sd: 1f64,
            shape: 2f64,
            scale: 1f64,
            // Switch at t = 5.
            alpha: vec![0f64, 0f64, -10f64, 2f64],
            beta: vec![0f64, 1f64, 10f64, -1f64],
            curve_sd: vec![0.3, 0.3],
        },
        Truth {
            mean: 3f64,
            sd: 1f64,
            shape: 9f64,
            scale: 1f64,
            // Switch at t = 3.
            alpha: vec![0f64, 0f64, -6f64, 2f64],
            beta: vec![5f64, 0f64, -1f64, 2f64],
            curve_sd: vec![0.3, 0.3],
        },
    ]
}

fn censor<R: Rng>(x: f64, missing_rate: f64, rng: &mut R) -> Option<f64> {
    match 0f64 < missing_rate && rng.gen_bool(missing_rate) {
        true => None,
        false => Some(x),
    }
}

/// Draw a dataset of two clusters with one Gaussian, one Gamma, and one
/// functional variable. The true clusters are stored as the assignments.
pub fn simulate<R: Rng>(rng: &mut R, config: &SimulationConfig) -> Result<DataSet> {
    if config.time_num == 0 || !(0f64 < config.time_max) {
        return Err(MixtureError::Configuration(format!(
            "{} time points in [0,{}]",
            config.time_num, config.time_max
        )));
    }
    if !(0f64..1f64).contains(&config.missing_rate) {
        return Err(MixtureError::Configuration(format!(
            "missing rate {} is not in [0,1)",
            config.missing_rate
        )));
    }
    let truths = truths();
    let mut reals = vec![];
    let mut positives = vec![];
    let mut curves = vec![];
    let mut assignments = vec![];
    for id in 0..config.individual_num {
        let k = rng.gen_range(0..truths.len());
        let truth = &truths[k];
        let to_error = |e: &dyn std::fmt::Display| MixtureError::Configuration(format!("{e}"));
        let normal = Normal::new(truth.mean, truth.sd).map_err(|e| to_error(&e))?;
        let x = normal.sample(rng);
        reals.push(censor(x, config.missing_rate, rng));
        let gamma = Gamma::new(truth.shape, truth.scale).map_err(|e| to_error(&e))?;
        let x = gamma.sample(rng);
        positives.push(censor(x, config.missing_rate, rng));
        let mut times: Vec<f64> = (0..config.time_num)
            .map(|_| rng.gen_range(0f64..=config.time_max))
            .collect();
        times.sort_by(|x, y| x.total_cmp(y));
        let alpha = alpha_from_flat(&truth.alpha);
        let beta = DMatrix::from_row_slice(2, 2, &truth.beta);
        let curve = Curve::sample(times, &alpha, &beta, &truth.curve_sd, rng)?;
        curves.push(curve.to_definition());
        let mut posterior = vec![0f64; truths.len()];
        posterior[k] = 1f64;
        assignments.push(Assignment::new(id as u64, k, posterior));
    }
    debug!("SIM\t{}\t{}", config.individual_num, config.time_num);
    let functional = ModelType::Functional {
        sub_num: 2,
        coeff_num: 2,
    };
    let variables = vec![
        Variable::new("gaussian", ModelType::Gaussian, VariableData::Real(reals)),
        Variable::new("gamma", ModelType::Gamma, VariableData::Real(positives)),
        Variable::new("curve", functional, VariableData::Functional(curves)),
    ];
    let mut ds = DataSet::new("simulated", config.individual_num, variables);
    ds.assignments = assignments;
    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlgorithmKind, ClusteringConfig};
    use crate::entry::MixtureClustering;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    #[test]
    fn simulate_and_cluster() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(100);
        let config = SimulationConfig {
            individual_num: 60,
            time_num: 20,
            ..Default::default()
        };
        let mut ds = simulate(&mut rng, &config).unwrap();
        assert_eq!(ds.variables.len(), 3);
        assert!(ds.variables.iter().all(|v| v.len() == 60));
        let answer: Vec<_> = ds.assignments.iter().map(|a| a.cluster).collect();
        let mut clustering = ClusteringConfig::new(2, 100, AlgorithmKind::Em);
        clustering.try_num = 2;
        clustering.iter_max = 50;
        clustering.init_iter_max = 20;
        ds.cluster_mixture(&clustering).unwrap();
        let pred: Vec<_> = ds.assignments.iter().map(|a| a.cluster).collect();
        let agree = answer.iter().zip(pred.iter()).filter(|(a, p)| a == p).count();
        let agree = agree.max(60 - agree);
        assert!(55 <= agree, "{:?}\n{:?}", answer, pred);
    }
    #[test]
    fn invalid_config() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(100);
        let config = SimulationConfig {
            time_num: 0,
            ..Default::default()
        };
        assert!(simulate(&mut rng, &config).is_err());
        let config = SimulationConfig {
            missing_rate: 1f64,
            ..Default::default()
        };
        assert!(simulate(&mut rng, &config).is_err());
    }
    #[test]
    fn missing_rate() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(101);
        let config = SimulationConfig {
            individual_num: 200,
            time_num: 5,
            missing_rate: 0.2,
            ..Default::default()
        };
        let ds = simulate(&mut rng, &config).unwrap();
        let missing = ds.variables[0].data.missing_num();
        assert!(10 < missing && missing < 80, "{}", missing);
        assert_eq!(ds.variables[2].data.missing_num(), 0);
        let complete = simulate(&mut rng, &SimulationConfig::default()).unwrap();
        assert_eq!(complete.variables[1].data.missing_num(), 0);
    }
}
