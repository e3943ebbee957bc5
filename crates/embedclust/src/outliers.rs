use crate::types::{Partition, Point};
use crate::vector::{centroid_of, cosine_similarity};
use serde::{Deserialize, Serialize};
use tracing::debug;

// Below this cosine similarity to its centroid a point is always an outlier
pub const SIMILARITY_FLOOR: f64 = 0.8;
// Keeps z-scores finite on near-uniform clusters
pub const STD_DEV_FLOOR: f64 = 1e-4;

// All points together look like a single mass when their similarity to the
// global centroid is this high and this tight
pub const HOMOGENEOUS_MIN_MEAN: f64 = 0.95;
pub const HOMOGENEOUS_MAX_STD_DEV: f64 = 0.01;

pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;
pub const DEFAULT_STD_DEV_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutlierOptions {
    /// Clusters smaller than this are flagged as a whole.
    pub min_cluster_size: usize,

    /// How many standard deviations below the cluster's mean similarity a
    /// point may fall before it is flagged.
    pub std_dev_threshold: f64,
}

impl Default for OutlierOptions {
    fn default() -> Self {
        Self {
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            std_dev_threshold: DEFAULT_STD_DEV_THRESHOLD,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Stats {
    mean: f64,
    std_dev: f64,
}

// Population statistics; `values` is never empty here
fn stats(values: &[f64]) -> Stats {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Stats {
        mean,
        std_dev: variance.sqrt(),
    }
}

fn similarities_to_centroid<'a>(points: impl Iterator<Item = &'a Point> + Clone) -> Vec<f64> {
    let centroid = centroid_of(points.clone().map(|p| p.embedding.as_slice()));
    points
        .map(|p| cosine_similarity(&p.embedding, &centroid))
        .collect()
}

fn is_homogeneous(partition: &Partition) -> bool {
    if partition.point_count() == 0 {
        return false;
    }

    let similarities = similarities_to_centroid(partition.points());
    let Stats { mean, std_dev } = stats(&similarities);
    // NaN (zero vectors) fails both comparisons
    mean > HOMOGENEOUS_MIN_MEAN && std_dev < HOMOGENEOUS_MAX_STD_DEV
}

fn flag_cluster(points: &[Point], options: &OutlierOptions) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }

    // An undersized cluster is an anomaly group, not judged point by point
    if points.len() < options.min_cluster_size {
        return points.iter().map(|p| p.flagged(true)).collect();
    }

    let similarities = similarities_to_centroid(points.iter());
    let Stats { mean, std_dev } = stats(&similarities);
    let std_dev = std_dev.max(STD_DEV_FLOOR);

    points
        .iter()
        .zip(&similarities)
        .map(|(p, &similarity)| {
            let z = (similarity - mean) / std_dev;
            p.flagged(similarity < SIMILARITY_FLOOR || z < -options.std_dev_threshold)
        })
        .collect()
}

/// Annotates every point of `partition` with `is_outlier`.
///
/// Points are never moved between clusters or dropped; the returned
/// partition has the same keys and the same order as the input.
pub fn detect_outliers(partition: &Partition, options: &OutlierOptions) -> Partition {
    if is_homogeneous(partition) {
        debug!(
            points = partition.point_count(),
            "homogeneous input, no outliers"
        );
        return Partition::from_clusters(
            partition
                .clusters()
                .iter()
                .map(|points| points.iter().map(|p| p.flagged(false)).collect())
                .collect(),
        );
    }

    let result = Partition::from_clusters(
        partition
            .clusters()
            .iter()
            .map(|points| flag_cluster(points, options))
            .collect(),
    );

    debug!(
        clusters = result.len(),
        outliers = result.outliers().count(),
        "outlier detection done"
    );
    result
}
