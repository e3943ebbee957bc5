use crate::matrix::EmbeddingMatrix;

pub mod lloyds;
pub mod plus_plus_init;

// References:
// - k-means++: The Advantages of Careful Seeding (D. Arthur, S. Vassilvitskii)
//   https://theory.stanford.edu/~sergei/papers/kMeansPP-soda.pdf
// - https://scikit-learn.org/stable/modules/generated/sklearn.cluster.KMeans.html
//
// Observations:
// - Text embeddings are high-dimensional but the inputs are small (tens to
//   hundreds of items), so a plain row-major scan beats anything clever.

pub const MIN_CENTROIDS: usize = 2;
pub const MAX_CENTROIDS: usize = 6;

#[derive(Debug)]
pub struct Centroids {
    pub centroids: EmbeddingMatrix,
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}
