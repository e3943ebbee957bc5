// Distances and centroids over plain f64 slices.
//
// Embeddings arrive as JSON numbers and are kept as f64 end to end, so the
// vectors handed back are the ones that came in. Clustering runs on squared
// Euclidean distance; cosine similarity is only used for outlier scoring.

#[inline(always)]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());

    let mut sum = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let d = x - y;
        sum = d.mul_add(d, sum);
    }
    sum
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

#[inline]
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns NaN if either vector has zero magnitude; callers decide what
/// a zero embedding means for them.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    dot(a, b) / (norm(a) * norm(b))
}

/// Per-dimension arithmetic mean of a non-empty set of equal-length rows.
pub fn centroid_of<'a, I>(rows: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut rows = rows.into_iter();
    let first = rows.next().expect("centroid of an empty set");

    let mut sums = first.to_vec();
    let mut count = 1usize;
    for row in rows {
        assert_eq!(row.len(), sums.len());
        for (s, &x) in sums.iter_mut().zip(row) {
            *s += x;
        }
        count += 1;
    }

    let n = count as f64;
    sums.into_iter().map(|s| s / n).collect()
}

/// True if every row is within `tolerance` of `reference` on every dimension.
pub fn all_within(reference: &[f64], rows: &[&[f64]], tolerance: f64) -> bool {
    rows.iter().all(|row| {
        row.len() == reference.len()
            && row
                .iter()
                .zip(reference)
                .all(|(&x, &r)| (x - r).abs() < tolerance)
    })
}
