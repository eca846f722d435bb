//! Fingerprints, similarity matrices and the inputs a fit can start from.

use rand::Rng;
use sprs::CsMat;

use crate::error::{Error, Result};
use crate::pairs::PairStore;

/// Index of an item within the collection being fitted.
pub type ItemIndex = usize;

/// Row-major `n_items x length` matrix of fingerprints.
///
/// Binary fingerprints are stored as `0.0`/`1.0` values.
#[derive(Debug, PartialEq, Clone)]
pub struct FingerprintMatrix {
    data: Vec<f32>,
    n_items: usize,
    length: usize,
}

impl FingerprintMatrix {

    pub fn new(data: Vec<f32>, n_items: usize, length: usize) -> Result<Self> {

        if data.len() != n_items * length {
            return Err(Error::DimensionMismatch { expected: n_items * length, got: data.len() });
        }

        return Ok(Self { data, n_items, length });
    }

    /// Builds a matrix from one vector per item; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {

        let length = rows.first().map_or(0, |r| r.len());
        let n_items = rows.len();

        let mut data: Vec<f32> = Vec::with_capacity(n_items * length);
        for row in rows {
            if row.len() != length {
                return Err(Error::DimensionMismatch { expected: length, got: row.len() });
            }
            data.extend(row);
        }

        return Ok(Self { data, n_items, length });
    }

    pub fn random<R: Rng + ?Sized>(n_items: usize, length: usize, rng: &mut R) -> Self {

        let data: Vec<f32> = (0..n_items * length).map(|_| rng.gen::<f32>()).collect();
        return Self { data, n_items, length };
    }

    /// Random bit fingerprints where each bit is set with probability `density`.
    pub fn random_binary<R: Rng + ?Sized>(n_items: usize, length: usize, density: f64, rng: &mut R) -> Self {

        let data: Vec<f32> = (0..n_items * length)
            .map(|_| if rng.gen_bool(density) { 1.0 } else { 0.0 })
            .collect();
        return Self { data, n_items, length };
    }

    pub fn row(&self, index: ItemIndex) -> &[f32] {
        &self.data[index * self.length..(index + 1) * self.length]
    }

    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// New matrix holding only the given rows, in the given order.
    pub fn select(&self, indices: &[ItemIndex]) -> Self {

        let mut data: Vec<f32> = Vec::with_capacity(indices.len() * self.length);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }

        return Self { data, n_items: indices.len(), length: self.length };
    }
}

/// Maps raw items to fingerprints.
pub trait Featurizer<T> {

    fn transform(&self, items: &[T]) -> Result<FingerprintMatrix>;
}

impl<T, F> Featurizer<T> for F
where
    F: Fn(&T) -> Vec<f32>,
{
    fn transform(&self, items: &[T]) -> Result<FingerprintMatrix> {

        let rows: Vec<Vec<f32>> = items.iter().map(|item| self(item)).collect();
        return FingerprintMatrix::from_rows(rows);
    }
}

/// A precomputed pairwise similarity matrix.
#[derive(Debug, Clone)]
pub enum SimilarityMatrix {
    /// Row-major `n x n` values.
    Dense { values: Vec<f32>, n_items: usize },
    Sparse(CsMat<f32>),
}

impl SimilarityMatrix {

    pub fn dense(rows: Vec<Vec<f32>>) -> Result<Self> {

        let n_items = rows.len();
        let mut values: Vec<f32> = Vec::with_capacity(n_items * n_items);
        for row in rows {
            if row.len() != n_items {
                return Err(Error::NonSquareMatrix { rows: n_items, cols: row.len() });
            }
            values.extend(row);
        }

        return Ok(SimilarityMatrix::Dense { values, n_items });
    }

    pub fn sparse(matrix: CsMat<f32>) -> Result<Self> {

        if matrix.rows() != matrix.cols() {
            return Err(Error::NonSquareMatrix { rows: matrix.rows(), cols: matrix.cols() });
        }

        return Ok(SimilarityMatrix::Sparse(matrix));
    }

    pub fn len(&self) -> usize {

        match self {
            SimilarityMatrix::Dense { n_items, .. } => *n_items,
            SimilarityMatrix::Sparse(m) => m.rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a fit starts from. Resolved once at the start of `fit`.
pub enum FitInput<'a, T> {
    /// Raw items plus the featurizer that turns them into fingerprints.
    RawItems { items: &'a [T], featurizer: &'a dyn Featurizer<T> },
    Fingerprints(FingerprintMatrix),
    /// Similarities are given directly; no metric is applied.
    SimilarityMatrix(SimilarityMatrix),
    /// Fingerprints with an already computed pair store, e.g. one read back from disk.
    FingerprintsWithPairs(FingerprintMatrix, PairStore),
}

impl<'a, T> FitInput<'a, T> {

    pub fn raw_items(items: &'a [T], featurizer: &'a dyn Featurizer<T>) -> Self {
        FitInput::RawItems { items, featurizer }
    }

    pub fn len(&self) -> usize {

        match self {
            FitInput::RawItems { items, .. } => items.len(),
            FitInput::Fingerprints(fps) => fps.len(),
            FitInput::SimilarityMatrix(m) => m.len(),
            FitInput::FingerprintsWithPairs(fps, _) => fps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> FitInput<'a, ()> {

    pub fn fingerprints(fps: FingerprintMatrix) -> Self {
        FitInput::Fingerprints(fps)
    }

    pub fn similarity_matrix(matrix: SimilarityMatrix) -> Self {
        FitInput::SimilarityMatrix(matrix)
    }

    pub fn with_pairs(fps: FingerprintMatrix, pairs: PairStore) -> Self {
        FitInput::FingerprintsWithPairs(fps, pairs)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ragged_rows_are_rejected() {

        let rows = vec![vec![1.0, 0.0], vec![1.0]];
        let res = FingerprintMatrix::from_rows(rows);

        assert!(matches!(res, Err(Error::DimensionMismatch { expected: 2, got: 1 })));
    }

    #[test]
    fn closure_featurizer() {

        let items = vec!["CC", "CCO", "C"];
        let featurizer = |s: &&str| vec![s.len() as f32, s.contains('O') as u8 as f32];

        let fps = featurizer.transform(&items).unwrap();

        assert_eq!(fps.len(), 3);
        assert_eq!(fps.length(), 2);
        assert_eq!(fps.row(1), &[3.0, 1.0]);
    }

    #[test]
    fn select_rows_keeps_order() {

        let mut rng = StdRng::seed_from_u64(7);
        let fps = FingerprintMatrix::random_binary(10, 16, 0.3, &mut rng);

        let sub = fps.select(&[4, 1]);

        assert_eq!(sub.len(), 2);
        assert_eq!(sub.row(0), fps.row(4));
        assert_eq!(sub.row(1), fps.row(1));
    }

    #[test]
    fn non_square_similarity_matrix() {

        let res = SimilarityMatrix::dense(vec![vec![1.0, 0.5], vec![0.5, 1.0], vec![0.1, 0.1]]);
        assert!(matches!(res, Err(Error::NonSquareMatrix { rows: 3, cols: 2 })));
    }
}
