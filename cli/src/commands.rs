use clap::{Arg, ArgAction, Command};

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

fn threads() -> Arg {
    Arg::new("threads")
        .short('t')
        .long("threads")
        .default_value("1")
        .help("number of threads")
}

fn subcommand_simulate() -> Command {
    Command::new("simulate")
        .version("0.1")
        .about("Draw a dataset from two known clusters and write it as JSON to stdout.")
        .arg(verbose())
        .arg(
            Arg::new("individual_num")
                .short('n')
                .long("individual_num")
                .default_value("100")
                .help("Number of individuals."),
        )
        .arg(
            Arg::new("time_num")
                .long("time_num")
                .default_value("30")
                .help("Number of time points in each curve."),
        )
        .arg(
            Arg::new("time_max")
                .long("time_max")
                .default_value("10")
                .help("Time points are drawn from [0, time_max]."),
        )
        .arg(
            Arg::new("missing_rate")
                .long("missing_rate")
                .default_value("0")
                .help("Probability that a scalar observation is missing."),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .default_value("42")
                .help("Seed"),
        )
}

fn subcommand_cluster() -> Command {
    Command::new("cluster")
        .version("0.1")
        .about("Cluster the individuals of the dataset from stdin by a mixture model.")
        .arg(verbose())
        .arg(threads())
        .arg(
            Arg::new("cluster_num")
                .short('k')
                .long("cluster_num")
                .default_value("2")
                .help("Number of clusters."),
        )
        .arg(
            Arg::new("algorithm")
                .short('a')
                .long("algorithm")
                .default_value("EM")
                .value_parser(["EM", "CEM", "SEM"])
                .help("Estimation algorithm."),
        )
        .arg(
            Arg::new("init")
                .long("init")
                .default_value("class")
                .value_parser(["class", "fuzzy"])
                .help("Initialization by random labels or by random posteriors."),
        )
        .arg(
            Arg::new("try_num")
                .long("try_num")
                .help("Number of independent runs. The best one is kept."),
        )
        .arg(
            Arg::new("iter_max")
                .long("iter_max")
                .help("Maximum iterations of the long run."),
        )
        .arg(
            Arg::new("confidence_level")
                .long("confidence_level")
                .default_value("0.95")
                .help("Level of the parameter intervals of SEM."),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .default_value("42")
                .help("Seed"),
        )
}

fn subcommand_stats() -> Command {
    Command::new("stats")
        .version("0.1")
        .about("Write stats to the specified file.")
        .arg(verbose())
        .arg(
            Arg::new("file")
                .long("file")
                .value_name("FILE")
                .short('f')
                .required(true),
        )
}

fn subcommand_pipeline() -> Command {
    Command::new("pipeline")
        .version("0.1")
        .about("Run pipeline based on the given TOML file.")
        .arg(
            Arg::new("profile")
                .short('p')
                .required(true)
                .help("TOML configuration file."),
        )
}

pub fn curvemix_parser() -> Command {
    Command::new("curvemix")
        .version("0.1")
        .about("Mixture model clustering of scalar and functional data")
        .arg_required_else_help(true)
        .subcommand(subcommand_simulate())
        .subcommand(subcommand_cluster())
        .subcommand(subcommand_stats())
        .subcommand(subcommand_pipeline())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parse_cluster() {
        let matches = curvemix_parser()
            .try_get_matches_from(["curvemix", "cluster", "-vv", "-k", "3", "-a", "SEM"])
            .unwrap();
        let (name, sub_m) = matches.subcommand().unwrap();
        assert_eq!(name, "cluster");
        assert_eq!(sub_m.get_count("verbose"), 2);
        assert_eq!(sub_m.get_one::<String>("cluster_num").unwrap(), "3");
        assert_eq!(sub_m.get_one::<String>("algorithm").unwrap(), "SEM");
        assert_eq!(sub_m.get_one::<String>("threads").unwrap(), "1");
        assert!(sub_m.get_one::<String>("try_num").is_none());
    }
    #[test]
    fn parse_simulate() {
        let matches = curvemix_parser()
            .try_get_matches_from(["curvemix", "simulate", "--missing_rate", "0.1", "-s", "7"])
            .unwrap();
        let (_, sub_m) = matches.subcommand().unwrap();
        assert_eq!(sub_m.get_one::<String>("missing_rate").unwrap(), "0.1");
        assert_eq!(sub_m.get_one::<String>("seed").unwrap(), "7");
        assert_eq!(sub_m.get_one::<String>("individual_num").unwrap(), "100");
    }
    #[test]
    fn reject_algorithm() {
        let matches = curvemix_parser().try_get_matches_from(["curvemix", "cluster", "-a", "MCMC"]);
        assert!(matches.is_err());
    }
    #[test]
    fn verify() {
        curvemix_parser().debug_assert();
    }
}
