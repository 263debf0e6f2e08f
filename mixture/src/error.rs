use thiserror::Error;

/// Which random initialization produced an empty cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    RandomClass,
    RandomFuzzy,
}

impl std::fmt::Display for InitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InitKind::RandomClass => write!(f, "random class initialization"),
            InitKind::RandomFuzzy => write!(f, "random fuzzy initialization"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MixtureError {
    #[error("{kind} failed: the smallest cluster has {min_count} individuals")]
    DegenerateInitialization { kind: InitKind, min_count: f64 },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("the curve has no time point")]
    EmptyCurve,
    #[error("index {index} is out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("numeric failure: {0}")]
    NumericFailure(String),
    #[error("{algo} failed at step {step}: a cluster has only {count:.3} individuals")]
    AlgorithmFailure {
        algo: &'static str,
        step: usize,
        count: f64,
    },
}

impl MixtureError {
    /// Errors that a fresh random draw may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MixtureError::DegenerateInitialization { .. } | MixtureError::AlgorithmFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MixtureError>;
