use curvemix_cli::dataset_io::{init_threads, log_level, read_dataset, to_io_error, write_dataset};
use definitions::*;
use mixture::config::ClusteringConfig;
use std::io::{BufReader, BufWriter};
#[macro_use]
extern crate log;

fn main() -> std::io::Result<()> {
    let matches = curvemix_cli::commands::curvemix_parser().get_matches();
    if let Some(("pipeline", sub_m)) = matches.subcommand() {
        let path: &String = sub_m
            .get_one("profile")
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
        let file = std::fs::read_to_string(path)?;
        let config: curvemix_cli::pipeline::PipelineConfig =
            toml::from_str(&file).map_err(to_io_error)?;
        return curvemix_cli::pipeline::run_pipeline(&config);
    }
    if let Some((_, sub_m)) = matches.subcommand() {
        let level = log_level(sub_m.get_count("verbose") as usize);
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
    if let Some(("simulate", sub_m)) = matches.subcommand() {
        return simulate(sub_m).and_then(|ds| write_stdout(&ds));
    }
    let mut ds = read_dataset(BufReader::new(std::io::stdin().lock()))?;
    let ds = &mut ds;
    match matches.subcommand() {
        Some(("cluster", sub_m)) => cluster(sub_m, ds)?,
        Some(("stats", sub_m)) => return stats(sub_m, ds),
        _ => unreachable!(),
    };
    write_stdout(ds)
}

fn write_stdout(ds: &DataSet) -> std::io::Result<()> {
    write_dataset(BufWriter::new(std::io::stdout().lock()), ds)
}

fn parse_arg<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str) -> std::io::Result<T> {
    matches
        .get_one::<String>(name)
        .and_then(|x| x.parse().ok())
        .ok_or_else(|| {
            let msg = format!("{name} is missing or can not be parsed");
            std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
        })
}

fn simulate(matches: &clap::ArgMatches) -> std::io::Result<DataSet> {
    use mixture::simulate::{simulate, SimulationConfig};
    use rand::SeedableRng;
    debug!("START\tSimulate");
    let config = SimulationConfig {
        individual_num: parse_arg(matches, "individual_num")?,
        time_num: parse_arg(matches, "time_num")?,
        time_max: parse_arg(matches, "time_max")?,
        missing_rate: parse_arg(matches, "missing_rate")?,
    };
    let seed: u64 = parse_arg(matches, "seed")?;
    let mut rng = rand_xoshiro::Xoshiro256StarStar::seed_from_u64(seed);
    simulate(&mut rng, &config).map_err(to_io_error)
}

fn cluster(matches: &clap::ArgMatches, dataset: &mut DataSet) -> std::io::Result<()> {
    use mixture::entry::MixtureClustering;
    debug!("START\tCluster");
    init_threads(parse_arg(matches, "threads")?);
    let cluster_num: usize = parse_arg(matches, "cluster_num")?;
    let seed: u64 = parse_arg(matches, "seed")?;
    let algorithm = parse_arg(matches, "algorithm")?;
    let mut config = ClusteringConfig::new(cluster_num, seed, algorithm);
    config.init = parse_arg(matches, "init")?;
    if matches.contains_id("try_num") {
        config.try_num = parse_arg(matches, "try_num")?;
    }
    if matches.contains_id("iter_max") {
        config.iter_max = parse_arg(matches, "iter_max")?;
    }
    config.confidence_level = parse_arg(matches, "confidence_level")?;
    dataset.cluster_mixture(&config).map_err(to_io_error)?;
    if let Some(icl) = dataset.icl {
        info!("CLUSTER\t{}\t{}\t{:.4}", config.algorithm, cluster_num, icl);
    }
    Ok(())
}

fn stats(matches: &clap::ArgMatches, dataset: &mut DataSet) -> std::io::Result<()> {
    use mixture::stats::Stats;
    debug!("START\tStats step");
    let file: String = parse_arg(matches, "file")?;
    let wtr = std::io::BufWriter::new(std::fs::File::create(file)?);
    dataset.stats(wtr)
}
