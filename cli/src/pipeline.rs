//! The whole clustering run driven by a TOML profile.
//!
//! The profile names the input dataset, the output paths and the parameters of the
//! clustering. Every key of [`ClusteringConfig`] can be written at the top level of the profile;
//! missing keys take their default values.
use crate::dataset_io::{init_threads, log_level, read_dataset, to_io_error, write_dataset};
use mixture::config::ClusteringConfig;
use serde::{Deserialize, Serialize};
extern crate log;
use log::*;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PipelineConfig {
    /// The dataset to be clustered, in JSON.
    input_file: PathBuf,
    /// The clustered dataset is written here.
    output: PathBuf,
    /// If given, the summary of the clustered dataset is written here.
    #[serde(default)]
    stats: Option<PathBuf>,
    #[serde(default)]
    verbose: usize,
    #[serde(default = "default_threads")]
    threads: usize,
    #[serde(flatten)]
    clustering: ClusteringConfig,
}

fn default_threads() -> usize {
    1
}

impl PipelineConfig {
    pub fn clustering(&self) -> &ClusteringConfig {
        &self.clustering
    }
}

pub fn run_pipeline(config: &PipelineConfig) -> std::io::Result<()> {
    let PipelineConfig {
        input_file,
        output,
        stats,
        verbose,
        threads,
        clustering,
    } = config.clone();
    let level = log_level(verbose);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    init_threads(threads);
    debug!("PIPELINE\tOpen\t{:?}", input_file);
    let mut ds = std::fs::File::open(&input_file)
        .map(BufReader::new)
        .and_then(read_dataset)?;
    use mixture::entry::MixtureClustering;
    info!(
        "PIPELINE\t{}\t{}\t{}",
        clustering.algorithm, clustering.cluster_num, clustering.seed
    );
    ds.cluster_mixture(&clustering).map_err(to_io_error)?;
    if let (Some(lk), Some(icl)) = (ds.ln_likelihood, ds.icl) {
        info!("PIPELINE\tLK\t{:.4}\tICL\t{:.4}", lk, icl);
    }
    std::fs::File::create(&output)
        .map(BufWriter::new)
        .and_then(|wtr| write_dataset(wtr, &ds))?;
    if let Some(path) = stats {
        use mixture::stats::Stats;
        let wtr = std::fs::File::create(path).map(BufWriter::new)?;
        ds.stats(wtr)?;
    }
    Ok(())
}
