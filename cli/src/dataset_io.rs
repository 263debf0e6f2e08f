//! Reading and writing datasets, shared by the subcommands and the pipeline.
use definitions::DataSet;
use log::debug;
use std::io::{Error, ErrorKind, Read, Write};

pub fn to_io_error<E: std::error::Error + Send + Sync + 'static>(why: E) -> Error {
    Error::new(ErrorKind::Other, why)
}

/// Log filter for the number of `-v` flags.
pub fn log_level(verbose: usize) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Parse a dataset in JSON. Every variable should have one observation per individual.
pub fn read_dataset<R: Read>(rdr: R) -> std::io::Result<DataSet> {
    let ds: DataSet = serde_json::de::from_reader(rdr)
        .map_err(|why| Error::new(ErrorKind::InvalidData, format!("not a dataset: {why}")))?;
    if let Some(var) = ds.variables.iter().find(|v| v.len() != ds.individual_num) {
        let msg = format!(
            "{} has {} observations for {} individuals",
            var.name,
            var.len(),
            ds.individual_num
        );
        return Err(Error::new(ErrorKind::InvalidData, msg));
    }
    for var in ds.variables.iter() {
        debug!("INPUT\t{}\t{}\t{}", var.name, var.model, var.data.missing_num());
    }
    Ok(ds)
}

pub fn write_dataset<W: Write>(mut wtr: W, ds: &DataSet) -> std::io::Result<()> {
    serde_json::ser::to_writer(&mut wtr, ds).map_err(to_io_error)?;
    wtr.flush()
}

/// Size the global rayon pool. A pool built earlier is kept.
pub fn init_threads(threads: usize) {
    debug!("THREADS\t{}", threads);
    if let Err(why) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        debug!("THREADS\tKeepPrevious\t{}", why);
    }
}
