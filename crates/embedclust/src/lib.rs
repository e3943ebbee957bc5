#[cfg(feature = "_debug")]
pub mod kmeans;
#[cfg(not(feature = "_debug"))]
mod kmeans;
#[cfg(feature = "_debug")]
pub mod matrix;
#[cfg(not(feature = "_debug"))]
mod matrix;
#[cfg(feature = "_debug")]
pub mod rng;
#[cfg(not(feature = "_debug"))]
mod rng;

#[cfg(feature = "_debug")]
pub mod debug_helpers;
pub mod outliers;
mod types;
pub mod vector;

pub use outliers::{OutlierOptions, detect_outliers};
pub use rng::DEFAULT_SEED;
pub use types::{Partition, Point};

use kmeans::{MAX_CENTROIDS, MIN_CENTROIDS, lloyds};
use matrix::EmbeddingMatrix;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::debug;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ClusterError {
    #[snafu(display("Input array cannot be empty"))]
    EmptyInput,

    #[snafu(display("All embeddings must have the same length"))]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
}

// Per-dimension tolerance under which all inputs count as the same vector
const IDENTICAL_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_CLUSTERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusteringOptions {
    /// Requested cluster count. Clamped to `2..=6` and to the number of inputs.
    pub n_clusters: usize,

    /// Cap on Lloyd's iterations. Hitting it is not an error.
    pub max_iterations: usize,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            n_clusters: DEFAULT_CLUSTERS,
            max_iterations: lloyds::DEFAULT_MAX_ITER,
        }
    }
}

impl From<usize> for ClusteringOptions {
    fn from(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Default::default()
        }
    }
}

/// Options for [`cluster_and_detect_outliers`], flat like the JSON request body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    pub n_clusters: usize,
    pub min_cluster_size: usize,
    pub std_dev_threshold: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let outliers = OutlierOptions::default();
        Self {
            n_clusters: DEFAULT_CLUSTERS,
            min_cluster_size: outliers.min_cluster_size,
            std_dev_threshold: outliers.std_dev_threshold,
        }
    }
}

impl PipelineOptions {
    pub fn clustering(&self) -> ClusteringOptions {
        ClusteringOptions::from(self.n_clusters)
    }

    pub fn outliers(&self) -> OutlierOptions {
        OutlierOptions {
            min_cluster_size: self.min_cluster_size,
            std_dev_threshold: self.std_dev_threshold,
        }
    }
}

/// The number of clusters actually produced for `n_clusters` requested over `n_points`.
pub fn effective_clusters(n_clusters: usize, n_points: usize) -> usize {
    // Not `clamp`: with a single point the upper bound drops below the lower one
    n_clusters.max(MIN_CENTROIDS).min(MAX_CENTROIDS.min(n_points))
}

fn validate(inputs: &[Point]) -> Result<(), ClusterError> {
    ensure!(!inputs.is_empty(), EmptyInputSnafu);

    let expected = inputs[0].embedding.len();
    if let Some((index, point)) = inputs
        .iter()
        .enumerate()
        .find(|(_, p)| p.embedding.len() != expected)
    {
        return DimensionMismatchSnafu {
            index,
            expected,
            got: point.embedding.len(),
        }
        .fail();
    }

    Ok(())
}

/// Groups points by their embeddings with k-means++ and Lloyd's algorithm.
///
/// ```
/// use embedclust::{Point, cluster};
///
/// let inputs = vec![
///     Point::new("sales meeting", vec![0.9, 0.1, 0.1]),
///     Point::new("revenue discussion", vec![0.85, 0.15, 0.1]),
///     Point::new("lunch break", vec![0.1, 0.9, 0.1]),
///     Point::new("team lunch", vec![0.15, 0.85, 0.1]),
/// ];
///
/// let partition = cluster(&inputs, 2usize).unwrap();
/// assert_eq!(partition.len(), 2);
/// assert_eq!(partition.point_count(), 4);
/// ```
///
/// The result always has `clamp(n_clusters, 2, min(6, inputs.len()))` keys,
/// some possibly empty. If all embeddings are the same vector (within
/// `1e-6` per dimension) clustering is skipped and a single `cluster_0`
/// holds every point, flagged as not an outlier.
///
/// Uses a fixed-seed generator, so equal inputs give equal partitions. See
/// [`cluster_with_rng`] to supply your own.
pub fn cluster(
    inputs: &[Point],
    options: impl Into<ClusteringOptions>,
) -> Result<Partition, ClusterError> {
    let mut rng = rng::new();
    cluster_with_rng(&mut rng, inputs, options)
}

pub fn cluster_with_rng(
    rng: &mut impl RngExt,
    inputs: &[Point],
    options: impl Into<ClusteringOptions>,
) -> Result<Partition, ClusterError> {
    let options = options.into();
    validate(inputs)?;

    let embeddings: Vec<&[f64]> = inputs.iter().map(|p| p.embedding.as_slice()).collect();
    if vector::all_within(embeddings[0], &embeddings, IDENTICAL_TOLERANCE) {
        debug!(points = inputs.len(), "identical embeddings, single cluster");
        return Ok(Partition::single(
            inputs.iter().map(|p| p.flagged(false)).collect(),
        ));
    }

    let k = effective_clusters(options.n_clusters, inputs.len());
    let matrix: EmbeddingMatrix = embeddings.into_iter().collect();

    let result = lloyds::find_centroids(rng, &matrix, k, options.max_iterations);
    debug!(
        requested = options.n_clusters,
        k,
        iterations = result.iterations,
        converged = result.converged,
        "k-means done"
    );

    let mut clusters: Vec<Vec<Point>> = vec![Vec::new(); k];
    for (point, &label) in inputs.iter().zip(&result.assignments) {
        clusters[label % k].push(point.unflagged());
    }

    Ok(Partition::from_clusters(clusters))
}

/// [`cluster`] followed by [`detect_outliers`].
pub fn cluster_and_detect_outliers(
    inputs: &[Point],
    options: &PipelineOptions,
) -> Result<Partition, ClusterError> {
    let mut rng = rng::new();
    cluster_and_detect_outliers_with_rng(&mut rng, inputs, options)
}

pub fn cluster_and_detect_outliers_with_rng(
    rng: &mut impl RngExt,
    inputs: &[Point],
    options: &PipelineOptions,
) -> Result<Partition, ClusterError> {
    let partition = cluster_with_rng(rng, inputs, options.clustering())?;
    Ok(detect_outliers(&partition, &options.outliers()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn points(rows: &[(&str, &[f64])]) -> Vec<Point> {
        rows.iter()
            .map(|&(text, embedding)| Point::new(text, embedding.to_vec()))
            .collect()
    }

    fn texts(cluster: &[Point]) -> Vec<&str> {
        cluster.iter().map(|p| p.text.as_str()).collect()
    }

    fn assert_conserved(inputs: &[Point], partition: &Partition) {
        assert_eq!(partition.point_count(), inputs.len());
        let mut seen: Vec<&str> = partition.points().map(|p| p.text.as_str()).collect();
        seen.sort();
        let mut expected: Vec<&str> = inputs.iter().map(|p| p.text.as_str()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    fn spread(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let angle = i as f64 * 0.7;
                Point::new(format!("p{i}"), vec![angle.cos() * (1.0 + i as f64), angle.sin()])
            })
            .collect()
    }

    #[test]
    fn empty_input() {
        let err = cluster(&[], 3usize).unwrap_err();
        assert!(matches!(err, ClusterError::EmptyInput));
        assert_eq!(err.to_string(), "Input array cannot be empty");
    }

    #[test]
    fn dimension_mismatch() {
        let inputs = points(&[("a", &[1.0, 0.0]), ("b", &[0.0, 1.0]), ("c", &[1.0])]);
        let err = cluster(&inputs, 2usize).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::DimensionMismatch {
                index: 2,
                expected: 2,
                got: 1
            }
        ));
        assert_eq!(err.to_string(), "All embeddings must have the same length");
    }

    #[test]
    fn effective_cluster_bounds() {
        assert_eq!(effective_clusters(1, 10), 2);
        assert_eq!(effective_clusters(0, 10), 2);
        assert_eq!(effective_clusters(3, 10), 3);
        assert_eq!(effective_clusters(10, 10), 6);
        assert_eq!(effective_clusters(5, 4), 4);
        assert_eq!(effective_clusters(3, 2), 2);
        assert_eq!(effective_clusters(3, 1), 1);
    }

    #[test]
    fn cluster_count_matches_bounds() {
        let inputs = spread(12);
        for requested in [1, 2, 3, 6, 10] {
            let partition = cluster(&inputs, requested).unwrap();
            assert_eq!(
                partition.len(),
                effective_clusters(requested, inputs.len()),
                "requested {requested}"
            );
            assert_conserved(&inputs, &partition);
        }
    }

    #[test]
    fn fewer_points_than_clusters() {
        let inputs = points(&[("a", &[1.0, 0.0]), ("b", &[0.0, 1.0]), ("c", &[-1.0, 0.0])]);
        let partition = cluster(&inputs, 6usize).unwrap();
        assert_eq!(partition.len(), 3);
        assert!(partition.clusters().iter().all(|c| c.len() == 1));
    }

    #[test]
    fn identical_embeddings_single_cluster() {
        let inputs: Vec<Point> = (0..5)
            .map(|i| Point::new(format!("point{i}"), vec![0.5, 0.5]))
            .collect();

        let partition = cluster(&inputs, 3usize).unwrap();

        assert_eq!(partition.len(), 1);
        let cluster_0 = partition.get("cluster_0").unwrap();
        assert_eq!(texts(cluster_0), vec!["point0", "point1", "point2", "point3", "point4"]);
        assert!(cluster_0.iter().all(|p| p.is_outlier == Some(false)));
    }

    #[test]
    fn near_identical_embeddings_single_cluster() {
        let inputs: Vec<Point> = (0..6)
            .map(|i| Point::new(format!("point{i}"), vec![1.0 + i as f64 * 1e-8, 1.0]))
            .collect();

        let partition = cluster(&inputs, 2usize).unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.point_count(), 6);
    }

    #[test]
    fn single_point() {
        let inputs = points(&[("only", &[0.3, 0.4])]);
        let partition = cluster(&inputs, 3usize).unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.point_count(), 1);
    }

    #[test]
    fn antipodal_groups_separate() {
        let inputs = points(&[
            ("pos_x", &[1.0, 0.0]),
            ("neg_x", &[-1.0, 0.0]),
            ("pos_x2", &[0.98, 0.02]),
            ("neg_x2", &[-0.98, -0.02]),
            ("pos_x3", &[0.95, -0.05]),
        ]);

        let partition = cluster(&inputs, 2usize).unwrap();

        assert_eq!(partition.len(), 2);
        let mut groups: Vec<Vec<&str>> = partition.clusters().iter().map(|c| texts(c)).collect();
        groups.sort();
        // Input order is kept inside each cluster
        assert_eq!(
            groups,
            vec![vec!["neg_x", "neg_x2"], vec!["pos_x", "pos_x2", "pos_x3"]]
        );
    }

    #[test]
    fn orthogonal_axes_three_clusters() {
        let inputs = points(&[
            ("x1", &[1.0, 0.0, 0.0]),
            ("x2", &[0.98, 0.02, 0.0]),
            ("y1", &[0.0, 1.0, 0.0]),
            ("y2", &[0.02, 0.98, 0.0]),
            ("z1", &[0.0, 0.0, 1.0]),
            ("z2", &[0.0, 0.02, 0.98]),
        ]);

        let partition = cluster(&inputs, 3usize).unwrap();

        assert_eq!(partition.len(), 3);
        for c in partition.clusters() {
            assert_eq!(c.len(), 2);
            assert_eq!(c[0].text[..1], c[1].text[..1]);
        }
    }

    #[test]
    fn output_embeddings_are_bit_identical() {
        let inputs = points(&[
            ("a", &[0.1, 0.2, 0.3]),
            ("b", &[0.11, 0.19, 0.31]),
            ("c", &[-0.7, 0.01, 1e-7]),
            ("d", &[-0.69, 0.02, -0.0]),
        ]);

        let partition = cluster(&inputs, 2usize).unwrap();

        for point in partition.points() {
            let input = inputs.iter().find(|p| p.text == point.text).unwrap();
            let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&point.embedding), bits(&input.embedding));
            assert_eq!(point.is_outlier, None);
        }
    }

    #[test]
    fn deterministic() {
        let inputs = spread(20);
        let a = cluster(&inputs, 4usize).unwrap();
        let b = cluster(&inputs, 4usize).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_rng_conserves_points() {
        let inputs = spread(15);
        for seed in 0..20 {
            let mut rng = rng::with_seed(seed);
            let partition = cluster_with_rng(&mut rng, &inputs, 5usize).unwrap();
            assert_eq!(partition.len(), 5);
            assert_conserved(&inputs, &partition);
        }
    }

    #[test]
    fn options_from_json() {
        let options: PipelineOptions = serde_json::from_str(r#"{"nClusters":2}"#).unwrap();
        assert_eq!(
            options,
            PipelineOptions {
                n_clusters: 2,
                min_cluster_size: 3,
                std_dev_threshold: 2.0
            }
        );
        assert_eq!(options.clustering(), ClusteringOptions::from(2usize));
    }

    // The two planted outliers sit between the groups, so which cluster they
    // join depends on seeding. This exact outlier set holds for DEFAULT_SEED;
    // a few other seeds split the groups differently, which is k-means
    // behaviour and not a detection bug.
    #[test]
    fn pipeline_flags_distant_points() {
        let inputs = points(&[
            ("c1_1", &[1.0, 0.0]),
            ("c1_2", &[0.9, 0.1]),
            ("c1_3", &[1.1, -0.1]),
            ("c1_outlier", &[0.2, 0.2]),
            ("c2_1", &[0.0, 1.0]),
            ("c2_2", &[0.1, 0.9]),
            ("c2_3", &[-0.1, 1.1]),
            ("c2_outlier", &[-0.8, 0.5]),
        ]);
        let options = PipelineOptions {
            n_clusters: 2,
            std_dev_threshold: 1.5,
            ..Default::default()
        };

        let result = cluster_and_detect_outliers(&inputs, &options).unwrap();

        assert_eq!(result.len(), 2);
        assert_conserved(&inputs, &result);
        let mut outliers: Vec<&str> = result.outliers().map(|p| p.text.as_str()).collect();
        outliers.sort();
        assert_eq!(outliers, vec!["c1_outlier", "c2_outlier"]);
    }

    #[test]
    fn pipeline_flags_small_cluster() {
        let inputs = points(&[
            ("c1_1", &[1.0, 0.0]),
            ("c1_2", &[0.9, 0.1]),
            ("c1_3", &[1.1, -0.1]),
            ("c1_4", &[0.95, 0.05]),
            ("c2_1", &[0.0, 1.0]),
            ("c2_2", &[0.1, 0.9]),
        ]);
        let options = PipelineOptions {
            n_clusters: 2,
            min_cluster_size: 3,
            ..Default::default()
        };

        let result = cluster_and_detect_outliers(&inputs, &options).unwrap();

        let mut outliers: Vec<&str> = result.outliers().map(|p| p.text.as_str()).collect();
        outliers.sort();
        assert_eq!(outliers, vec!["c2_1", "c2_2"]);
    }

    #[test]
    fn pipeline_homogeneous_points() {
        let inputs = points(&[
            ("1", &[1.0, 0.0]),
            ("2", &[0.99, 0.01]),
            ("3", &[1.01, -0.01]),
        ]);
        let options = PipelineOptions {
            n_clusters: 1,
            std_dev_threshold: 0.5,
            ..Default::default()
        };

        let result = cluster_and_detect_outliers(&inputs, &options).unwrap();

        assert_eq!(result.len(), 2);
        assert_conserved(&inputs, &result);
        assert_eq!(result.outliers().count(), 0);
    }

    #[test]
    fn json_embeddings_pass_through_unchanged() {
        let inputs: Vec<Point> = serde_json::from_str(
            r#"[
                {"text":"a","embedding":[0.123456789012,0.5]},
                {"text":"b","embedding":[0.123456789013,0.5000000001]},
                {"text":"c","embedding":[-0.987654321098,0.25]},
                {"text":"d","embedding":[-0.987654321097,0.2500000001]}
            ]"#,
        )
        .unwrap();

        let partition = cluster(&inputs, 2usize).unwrap();
        let json = serde_json::to_string(&partition).unwrap();

        for value in ["0.123456789012", "0.5000000001", "-0.987654321098", "0.2500000001"] {
            assert!(json.contains(value), "{value} missing from {json}");
        }
        assert_conserved(&inputs, &partition);
    }

    #[test]
    fn pipeline_propagates_errors() {
        let err = cluster_and_detect_outliers(&[], &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, ClusterError::EmptyInput));
    }
}
