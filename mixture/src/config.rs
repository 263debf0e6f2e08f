use crate::param_stat::CONFIDENCE_LEVEL;
use serde::{Deserialize, Serialize};

pub const TRY_NUM: usize = 5;
pub const INIT_TRY_NUM: usize = 5;
pub const INIT_ITER_MAX: usize = 200;
pub const INIT_EPSILON: f64 = 1e-4;
pub const ITER_MAX: usize = 200;
pub const EPSILON: f64 = 1e-8;
pub const OPTIM_ITER_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// Expectation-maximization.
    Em,
    /// Classification EM.
    Cem,
    /// Stochastic EM.
    Sem,
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AlgorithmKind::Em => write!(f, "EM"),
            AlgorithmKind::Cem => write!(f, "CEM"),
            AlgorithmKind::Sem => write!(f, "SEM"),
        }
    }
}

impl std::str::FromStr for AlgorithmKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "em" => Ok(AlgorithmKind::Em),
            "cem" => Ok(AlgorithmKind::Cem),
            "sem" => Ok(AlgorithmKind::Sem),
            _ => Err(format!("{} is not an algorithm. Use EM, CEM, or SEM", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitMethod {
    /// Random hard labels.
    Class,
    /// Random soft posterior.
    Fuzzy,
}

impl std::str::FromStr for InitMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Ok(InitMethod::Class),
            "fuzzy" => Ok(InitMethod::Fuzzy),
            _ => Err(format!("{} is not an initialization. Use class or fuzzy", s)),
        }
    }
}

/// Parameters of one clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub cluster_num: usize,
    pub seed: u64,
    pub algorithm: AlgorithmKind,
    pub init: InitMethod,
    /// Independent runs. The one with the largest likelihood is kept.
    pub try_num: usize,
    /// Initialization attempts in each run.
    pub init_try_num: usize,
    pub init_iter_max: usize,
    pub init_epsilon: f64,
    pub iter_max: usize,
    pub epsilon: f64,
    /// Iterations of the optimizer for the segment weights.
    pub optim_iter_max: usize,
    /// Level of the parameter intervals reported after SEM, in (0, 1).
    pub confidence_level: f64,
}

impl ClusteringConfig {
    pub fn new(cluster_num: usize, seed: u64, algorithm: AlgorithmKind) -> Self {
        Self {
            cluster_num,
            seed,
            algorithm,
            ..Default::default()
        }
    }
}

impl std::default::Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            cluster_num: 2,
            seed: 42,
            algorithm: AlgorithmKind::Em,
            init: InitMethod::Class,
            try_num: TRY_NUM,
            init_try_num: INIT_TRY_NUM,
            init_iter_max: INIT_ITER_MAX,
            init_epsilon: INIT_EPSILON,
            iter_max: ITER_MAX,
            epsilon: EPSILON,
            optim_iter_max: OPTIM_ITER_MAX,
            confidence_level: CONFIDENCE_LEVEL,
        }
    }
}
