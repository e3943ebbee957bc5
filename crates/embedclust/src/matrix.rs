/// Row-major `n x dim` working copy of the input embeddings.
///
/// One matrix is built per clustering call and dropped with it, so the
/// kernels never touch the caller's vectors.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    pub dim: usize,
    pub data: Vec<f64>,
}

impl EmbeddingMatrix {
    pub fn new(dim: usize, rows: usize) -> Self {
        Self {
            dim,
            data: Vec::with_capacity(dim * rows),
        }
    }

    #[inline(always)]
    pub fn push(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.dim);
        self.data.extend_from_slice(row);
    }

    #[inline(always)]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    #[inline(always)]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.dim.max(1)).take(self.len())
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> FromIterator<&'a [f64]> for EmbeddingMatrix {
    fn from_iter<I: IntoIterator<Item = &'a [f64]>>(iter: I) -> Self {
        let mut iter = iter.into_iter().peekable();
        let dim = iter.peek().map_or(0, |row| row.len());
        let (lower, _) = iter.size_hint();

        let mut matrix = Self::new(dim, lower);
        for row in iter {
            matrix.push(row);
        }
        matrix
    }
}
