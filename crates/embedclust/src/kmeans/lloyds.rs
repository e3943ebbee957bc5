use super::{Centroids, MAX_CENTROIDS};
use crate::kmeans::plus_plus_init::initial_centroids;
use crate::matrix::EmbeddingMatrix;
use crate::vector::squared_distance;
use rand::RngExt;

pub const DEFAULT_MAX_ITER: usize = 100;
// On the sum of squared centroid displacement, not per centroid
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Assigns every row to its nearest centroid. Ties go to the lowest index.
#[inline]
pub fn assign_points(matrix: &EmbeddingMatrix, centroids: &EmbeddingMatrix, assignments: &mut [usize]) {
    assert_eq!(matrix.len(), assignments.len());
    assert_eq!(matrix.dim, centroids.dim);

    for (row, assignment) in matrix.rows().zip(assignments.iter_mut()) {
        let mut min = f64::INFINITY;
        let mut min_idx = 0;
        for (j, centroid) in centroids.rows().enumerate() {
            let d = squared_distance(row, centroid);
            if d < min {
                min = d;
                min_idx = j;
            }
        }

        *assignment = min_idx;
    }
}

#[derive(Debug)]
pub struct UpdateResult {
    pub shift_squared: f64,
    pub counts: Vec<u32>,
}

/// Moves every centroid to the mean of its assigned rows.
///
/// A centroid nobody was assigned to keeps its previous position, so `k`
/// stays stable even when a seed is never claimed.
#[inline]
pub fn update_centroids(
    matrix: &EmbeddingMatrix,
    assignments: &[usize],
    centroids: &mut EmbeddingMatrix,
) -> UpdateResult {
    let k = centroids.len();
    let dim = centroids.dim;

    let mut counts = vec![0u32; k];
    let mut sums = vec![0f64; k * dim];

    for (row, &assigned_c) in matrix.rows().zip(assignments) {
        assert!(assigned_c < k);

        counts[assigned_c] += 1;
        let sum = &mut sums[assigned_c * dim..(assigned_c + 1) * dim];
        for (s, &x) in sum.iter_mut().zip(row) {
            *s += x;
        }
    }

    let mut shift_squared = 0f64;

    for (i, &count) in counts.iter().enumerate() {
        if count == 0 {
            // Empty cluster, hold the previous centroid
            continue;
        }

        let n = count as f64;
        let sum = &sums[i * dim..(i + 1) * dim];
        for (c, &s) in centroids.row_mut(i).iter_mut().zip(sum) {
            let new = s / n;
            let d = *c - new;
            shift_squared = d.mul_add(d, shift_squared);
            *c = new;
        }
    }

    UpdateResult {
        shift_squared,
        counts,
    }
}

pub struct LloydsLoopResult {
    pub iterations: usize,
    pub converged: bool,
}

/// Alternates update and assignment until the centroids stop moving or
/// `max_iter` passes have run. Hitting the cap is not an error: the latest
/// assignments are kept.
pub fn lloyds_loop(
    matrix: &EmbeddingMatrix,
    max_iter: usize,
    assignments: &mut [usize],
    centroids: &mut EmbeddingMatrix,
) -> LloydsLoopResult {
    assert_eq!(matrix.len(), assignments.len());
    assert!(centroids.len() <= matrix.len());

    assign_points(matrix, centroids, assignments);

    for i in 0..max_iter {
        let update_result = update_centroids(matrix, assignments, centroids);

        if update_result.shift_squared < CONVERGENCE_TOLERANCE {
            return LloydsLoopResult {
                iterations: i + 1,
                converged: true,
            };
        }

        assign_points(matrix, centroids, assignments);
    }

    LloydsLoopResult {
        iterations: max_iter,
        converged: false,
    }
}

/// k-means++ seeding followed by Lloyd's refinement.
pub fn find_centroids(
    rng: &mut impl RngExt,
    matrix: &EmbeddingMatrix,
    k: usize,
    max_iter: usize,
) -> Centroids {
    assert!(k <= MAX_CENTROIDS);
    assert!(k <= matrix.len());

    let mut centroids = initial_centroids(rng, matrix, k);
    let mut assignments = vec![0usize; matrix.len()];

    let result = lloyds_loop(matrix, max_iter, &mut assignments, &mut centroids);

    Centroids {
        centroids,
        assignments,
        iterations: result.iterations,
        converged: result.converged,
    }
}
