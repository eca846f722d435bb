//! Computes all pairs of fingerprints whose similarity is above a floor.
//!
//! Two strategies are available. The dense one fills the whole condensed distance vector
//! before thresholding and needs O(n^2) memory. The blocked one walks the upper triangle of
//! the similarity matrix in square tiles of `block_width` items so only one tile is alive per
//! worker at a time. Tiles are independent and are evaluated on a rayon pool when more than
//! one job is requested.

use std::ops::Range;

use kdam::tqdm;
use log::debug;
use rayon::prelude::*;

use crate::data::FingerprintMatrix;
use crate::error::{Error, Result};
use crate::metric::DistanceMetric;
use crate::pairs::{PairRecord, PairStore};

/// A pair of index ranges covering one tile of the similarity matrix.
#[derive(Debug, PartialEq, Clone)]
pub struct BlockPair {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl BlockPair {

    fn is_diagonal(&self) -> bool {
        self.rows == self.cols
    }
}

/// Checkerboard of tiles covering the upper triangle (diagonal tiles included) of an
/// `n_items x n_items` matrix, row block by row block.
pub fn block_pairs(n_items: usize, block_width: usize) -> Vec<BlockPair> {

    let blocks: Vec<Range<usize>> = (0..n_items)
        .step_by(block_width.max(1))
        .map(|low| low..(low + block_width).min(n_items))
        .collect();

    let mut pairs: Vec<BlockPair> = Vec::with_capacity(blocks.len() * (blocks.len() + 1) / 2);
    for (a, rows) in blocks.iter().enumerate() {
        for cols in blocks[a..].iter() {
            pairs.push(BlockPair { rows: rows.clone(), cols: cols.clone() });
        }
    }

    return pairs;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jobs {
    Sequential,
    /// Use every core rayon can see.
    AllCores,
    Threads(usize),
}

impl Jobs {

    /// `-1` means all cores, `1` sequential, anything else that many threads.
    pub fn from_n_jobs(n_jobs: i32) -> Result<Self> {

        match n_jobs {
            -1 => Ok(Jobs::AllCores),
            1 => Ok(Jobs::Sequential),
            n if n > 1 => Ok(Jobs::Threads(n as usize)),
            n => Err(Error::InvalidConfig(format!("n_jobs must be -1 or positive, got {}", n))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Dense,
    Blocked { block_width: usize, jobs: Jobs },
}

#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    pub metric: DistanceMetric,
    pub floor: f32,
    pub strategy: Strategy,
    pub verbose: bool,
}

impl SimilarityEngine {

    pub fn new(metric: DistanceMetric, floor: f32, strategy: Strategy) -> Self {

        return Self {
            metric,
            floor,
            strategy,
            verbose: false,
        }
    }

    pub fn compute(&self, fps: &FingerprintMatrix) -> Result<PairStore> {

        let records = match self.strategy {
            Strategy::Dense => {
                debug!("Generating pairs using memory intensive technique.");
                self.dense(fps)
            },
            Strategy::Blocked { block_width, jobs } => {

                if block_width == 0 {
                    return Err(Error::InvalidConfig("block_width must be positive".to_string()));
                }
                if block_width > fps.len() {
                    return Err(Error::BlockWidthExceedsInstances { block_width, n_instances: fps.len() });
                }

                self.blocked(fps, block_width, jobs)?
            },
        };

        debug!("Found {} pairs above {}", records.len(), self.floor);

        return Ok(PairStore::new(records, self.floor));
    }

    /// Condensed distance vector for every `i < j`, thresholded afterwards.
    fn dense(&self, fps: &FingerprintMatrix) -> Vec<PairRecord> {

        let n = fps.len();

        let mut condensed: Vec<f32> = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                condensed.push(self.metric.distance(fps.row(i), fps.row(j)));
            }
        }

        let mut records: Vec<PairRecord> = Vec::new();
        let mut k = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = 1.0 - condensed[k];
                if sim > self.floor {
                    records.push(PairRecord::new(i, j, sim));
                }
                k += 1;
            }
        }

        return records;
    }

    fn blocked(&self, fps: &FingerprintMatrix, block_width: usize, jobs: Jobs) -> Result<Vec<PairRecord>> {

        let tiles = block_pairs(fps.len(), block_width);

        let per_tile: Vec<Vec<PairRecord>> = match jobs {
            Jobs::Sequential => {
                debug!("Generating pairs using memory optimized technique over {} blocks.", tiles.len());

                match self.verbose {
                    true => tqdm!(tiles.iter(), desc = "similarity blocks")
                        .map(|tile| self.above_minimum(fps, tile))
                        .collect(),
                    false => tiles.iter().map(|tile| self.above_minimum(fps, tile)).collect(),
                }
            },
            Jobs::AllCores => {
                debug!("Generating pairs using memory optimized technique with {} threads", rayon::current_num_threads());
                tiles.par_iter().map(|tile| self.above_minimum(fps, tile)).collect()
            },
            Jobs::Threads(n) => {
                debug!("Generating pairs using memory optimized technique with {} threads", n);
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                pool.install(|| tiles.par_iter().map(|tile| self.above_minimum(fps, tile)).collect())
            },
        };

        return Ok(per_tile.into_iter().flatten().collect());
    }

    /// Similarity submatrix of one tile, with the diagonal and lower triangle of diagonal
    /// tiles removed and everything at or below the floor dropped.
    fn above_minimum(&self, fps: &FingerprintMatrix, tile: &BlockPair) -> Vec<PairRecord> {

        let width = tile.cols.len();
        let mut sim_mat: Vec<f32> = vec![0.0; tile.rows.len() * width];

        for (a, i) in tile.rows.clone().enumerate() {
            for (b, j) in tile.cols.clone().enumerate() {
                sim_mat[a * width + b] = self.metric.similarity(fps.row(i), fps.row(j));
            }
        }

        let diagonal = tile.is_diagonal();
        let mut records: Vec<PairRecord> = Vec::new();

        for (a, i) in tile.rows.clone().enumerate() {
            for (b, j) in tile.cols.clone().enumerate() {
                if diagonal && b <= a {
                    continue;
                }
                let sim = sim_mat[a * width + b];
                if sim > self.floor {
                    records.push(PairRecord::new(i, j, sim));
                }
            }
        }

        return records;
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::metric::MetricKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine(strategy: Strategy, floor: f32) -> SimilarityEngine {
        SimilarityEngine::new(DistanceMetric::Named(MetricKind::Jaccard), floor, strategy)
    }

    fn blocked(block_width: usize, jobs: Jobs) -> Strategy {
        Strategy::Blocked { block_width, jobs }
    }

    #[test]
    fn tiles_cover_the_upper_triangle_once() {

        for n in [1, 5, 7, 16] {
            for w in 1..=n {

                let mut seen = vec![0u32; n * n];
                for tile in block_pairs(n, w) {
                    assert!(tile.rows.start <= tile.cols.start);
                    for i in tile.rows.clone() {
                        for j in tile.cols.clone() {
                            if tile.is_diagonal() && j <= i {
                                continue;
                            }
                            seen[i * n + j] += 1;
                        }
                    }
                }

                for i in 0..n {
                    for j in 0..n {
                        let expected = if i < j { 1 } else { 0 };
                        assert_eq!(seen[i * n + j], expected, "n={} w={} ({}, {})", n, w, i, j);
                    }
                }
            }
        }
    }

    #[test]
    fn blocked_matches_dense() {

        let mut rng = StdRng::seed_from_u64(42);

        for n in [2, 9, 30] {
            let fps = FingerprintMatrix::random_binary(n, 32, 0.4, &mut rng);
            let dense = engine(Strategy::Dense, 0.2).compute(&fps).unwrap();

            for w in [1, 2, 3, n / 2, n] {
                if w == 0 || w > n {
                    continue;
                }
                let res = engine(blocked(w, Jobs::Sequential), 0.2).compute(&fps).unwrap();
                assert_eq!(res, dense, "n={} w={}", n, w);
            }
        }
    }

    #[test]
    fn parallel_matches_sequential() {

        let mut rng = StdRng::seed_from_u64(3);
        let fps = FingerprintMatrix::random_binary(57, 24, 0.5, &mut rng);

        let sequential = engine(blocked(8, Jobs::Sequential), 0.3).compute(&fps).unwrap();
        let threads = engine(blocked(8, Jobs::Threads(4)), 0.3).compute(&fps).unwrap();
        let all = engine(blocked(8, Jobs::AllCores), 0.3).compute(&fps).unwrap();

        assert!(!sequential.is_empty());
        assert_eq!(sequential, threads);
        assert_eq!(sequential, all);
    }

    #[test]
    fn single_block_is_dense() {

        let mut rng = StdRng::seed_from_u64(11);
        let fps = FingerprintMatrix::random(12, 6, &mut rng);

        let metric = DistanceMetric::Named(MetricKind::Cosine);
        let dense = SimilarityEngine::new(metric.clone(), 0.5, Strategy::Dense).compute(&fps).unwrap();
        let single = SimilarityEngine::new(metric, 0.5, blocked(12, Jobs::Sequential)).compute(&fps).unwrap();

        assert_eq!(dense, single);
    }

    #[test]
    fn floor_of_one_gives_empty_store() {

        let fps = FingerprintMatrix::from_rows(vec![vec![1.0, 0.0]; 5]).unwrap();

        assert!(engine(Strategy::Dense, 1.0).compute(&fps).unwrap().is_empty());
        assert!(engine(blocked(2, Jobs::Sequential), 1.0).compute(&fps).unwrap().is_empty());
    }

    #[test]
    fn identical_fingerprints_are_fully_similar() {

        let fps = FingerprintMatrix::from_rows(vec![vec![1.0, 0.0, 1.0]; 4]).unwrap();
        let store = engine(Strategy::Dense, 0.5).compute(&fps).unwrap();

        assert_eq!(store.len(), 6);
        assert!(store.records().iter().all(|r| r.sim == 1.0 && r.i != r.j));
    }

    #[test]
    fn block_width_checks() {

        let mut rng = StdRng::seed_from_u64(1);
        let fps = FingerprintMatrix::random(4, 3, &mut rng);

        let res = engine(blocked(5, Jobs::Sequential), 0.1).compute(&fps);
        assert!(matches!(res, Err(Error::BlockWidthExceedsInstances { block_width: 5, n_instances: 4 })));

        let res = engine(blocked(0, Jobs::Sequential), 0.1).compute(&fps);
        assert!(matches!(res, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn n_jobs_parsing() {

        assert_eq!(Jobs::from_n_jobs(-1).unwrap(), Jobs::AllCores);
        assert_eq!(Jobs::from_n_jobs(1).unwrap(), Jobs::Sequential);
        assert_eq!(Jobs::from_n_jobs(6).unwrap(), Jobs::Threads(6));
        assert!(Jobs::from_n_jobs(0).is_err());
        assert!(Jobs::from_n_jobs(-3).is_err());
    }
}
