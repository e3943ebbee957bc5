use clap::Parser;
use embedclust::debug_helpers::{InputArgs, init_logging, load_partition, load_request};
use embedclust::{
    OutlierOptions, Partition, cluster_and_detect_outliers_with_rng, detect_outliers, rng,
};
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    input: InputArgs,

    /// Overrides nClusters from the request
    #[arg(long)]
    clusters: Option<usize>,

    /// Overrides minClusterSize from the request
    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Overrides stdDevThreshold from the request
    #[arg(long)]
    std_dev_threshold: Option<f64>,

    #[arg(long, default_value_t = rng::DEFAULT_SEED)]
    seed: u64,
}

fn run(args: &Args) -> Result<Partition, String> {
    if args.input.outliers_only {
        let partition = load_partition(&args.input.input).map_err(|e| e.to_string())?;
        let defaults = OutlierOptions::default();
        let options = OutlierOptions {
            min_cluster_size: args.min_cluster_size.unwrap_or(defaults.min_cluster_size),
            std_dev_threshold: args.std_dev_threshold.unwrap_or(defaults.std_dev_threshold),
        };
        return Ok(detect_outliers(&partition, &options));
    }

    let request = load_request(&args.input.input).map_err(|e| e.to_string())?;
    let (inputs, mut options) = request.into_parts();
    if let Some(n) = args.clusters {
        options.n_clusters = n;
    }
    if let Some(n) = args.min_cluster_size {
        options.min_cluster_size = n;
    }
    if let Some(t) = args.std_dev_threshold {
        options.std_dev_threshold = t;
    }

    let mut rng = rng::with_seed(args.seed);
    cluster_and_detect_outliers_with_rng(&mut rng, &inputs, &options).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.input.verbose);

    let t = Instant::now();
    let partition = match run(&args) {
        Ok(partition) => partition,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = t.elapsed();

    for (key, points) in partition.iter() {
        let outliers = points.iter().filter(|p| p.is_outlier == Some(true)).count();
        eprintln!("{key}: {} points, {outliers} outliers", points.len());
    }
    eprintln!("{} points in {:?}", partition.point_count(), elapsed);

    match serde_json::to_string_pretty(&partition) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
