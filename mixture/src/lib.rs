//! Mixture model clustering with EM, CEM, and SEM over several component
//! families, including a segmented regression model for curves.
pub mod composer;
pub mod config;
pub mod entry;
pub mod error;
pub mod functional;
pub mod models;
pub mod numeric;
pub mod optimizer;
pub mod param_stat;
pub mod sampler;
pub mod simulate;
pub mod stats;
#[macro_use]
extern crate log;

pub use composer::{ComposerState, MixtureComposer};
pub use config::{AlgorithmKind, ClusteringConfig, InitMethod};
pub use error::{InitKind, MixtureError, Result};
