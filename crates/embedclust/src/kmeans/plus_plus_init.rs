use crate::matrix::EmbeddingMatrix;
use crate::vector::squared_distance;
use rand::RngExt;

#[inline(always)]
fn sample_by_distance(rng: &mut impl RngExt, min_distances: &[f64], sum: f64) -> usize {
    // Everything left coincides with a chosen centroid, weights carry no signal
    if !(sum > 0.0 && sum.is_finite()) {
        return rng.random_range(0..min_distances.len());
    }

    let random_threshold = rng.random::<f64>() * sum;
    let mut cumsum = 0.0;
    let mut last_positive = 0;

    for (i, &distance) in min_distances.iter().enumerate() {
        if distance <= 0.0 {
            continue;
        }
        cumsum += distance;
        last_positive = i;
        if cumsum > random_threshold {
            return i;
        }
    }

    // Rounding left the running sum just short of the threshold
    last_positive
}

/// Picks `k` seed rows with k-means++ and returns their indices in pick order.
///
/// The first seed is uniform; every next one is drawn with probability
/// proportional to its squared distance to the nearest seed picked so far.
pub fn find_initial(rng: &mut impl RngExt, matrix: &EmbeddingMatrix, k: usize) -> Vec<usize> {
    let n = matrix.len();
    assert!(n > 0);

    // More clusters than points => silent clamping
    let k = k.min(n);

    let mut init_points = Vec::<usize>::with_capacity(k);
    let c0 = rng.random_range(0..n);
    init_points.push(c0);

    let mut min_distances = vec![0.0f64; n];
    let mut min_distances_sum = 0.0f64;
    let first = matrix.row(c0);
    for (i, row) in matrix.rows().enumerate() {
        let d = squared_distance(row, first);
        min_distances[i] = d;
        min_distances_sum += d;
    }

    for _ in 1..k {
        let next = sample_by_distance(rng, &min_distances, min_distances_sum);
        init_points.push(next);

        let chosen = matrix.row(next);
        min_distances_sum = 0.0;
        for (i, row) in matrix.rows().enumerate() {
            let d = squared_distance(row, chosen).min(min_distances[i]);
            min_distances[i] = d;
            min_distances_sum += d;
        }
    }

    init_points
}

/// Copies the rows picked by [`find_initial`] into a fresh centroid buffer.
pub fn initial_centroids(rng: &mut impl RngExt, matrix: &EmbeddingMatrix, k: usize) -> EmbeddingMatrix {
    let init_points = find_initial(rng, matrix, k);
    let mut centroids = EmbeddingMatrix::new(matrix.dim, init_points.len());
    for &idx in &init_points {
        centroids.push(matrix.row(idx));
    }
    centroids
}
