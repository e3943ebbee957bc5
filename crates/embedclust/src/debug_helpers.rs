use crate::{Partition, PipelineOptions, Point};
use clap::Parser;
use serde::Deserialize;
use snafu::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
pub struct InputArgs {
    /// Path to a JSON file: an array of {text, embedding} or {inputs, nClusters, ...}.
    /// With --outliers-only, a partition as printed by a previous run.
    pub input: PathBuf,

    /// Skip clustering and only flag outliers in an existing partition
    #[arg(long)]
    pub outliers_only: bool,

    /// Log k-means progress to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(Debug, Snafu)]
pub enum LoadError {
    #[snafu(display("could not read {}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{} is not a valid clustering request", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("{} is not a valid partition", path.display()))]
    ParsePartition {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The request body of the clustering endpoint, or just its `inputs`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Request {
    Bare(Vec<Point>),
    Full {
        inputs: Vec<Point>,
        #[serde(flatten)]
        options: PipelineOptions,
    },
}

impl Request {
    pub fn into_parts(self) -> (Vec<Point>, PipelineOptions) {
        match self {
            Request::Bare(inputs) => (inputs, PipelineOptions::default()),
            Request::Full { inputs, options } => (inputs, options),
        }
    }
}

pub fn load_request(path: &Path) -> Result<Request, LoadError> {
    let raw = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    serde_json::from_str(&raw).context(ParseSnafu { path })
}

pub fn load_partition(path: &Path) -> Result<Partition, LoadError> {
    let raw = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    serde_json::from_str(&raw).context(ParsePartitionSnafu { path })
}

pub fn init_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
