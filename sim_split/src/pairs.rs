//! Sparse store of similar pairs, kept sorted by similarity so that thresholding is a
//! binary search rather than a scan.

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{ItemIndex, SimilarityMatrix};
use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct PairRecord {
    pub i: ItemIndex,
    pub j: ItemIndex,
    pub sim: f32,
}

impl PairRecord {

    pub fn new(i: ItemIndex, j: ItemIndex, sim: f32) -> Self {
        Self { i, j, sim }
    }

    /// Ascending by similarity, then by `(i, j)`. Total, so the sorted order never depends on
    /// the order records were produced in.
    fn order(a: &PairRecord, b: &PairRecord) -> Ordering {

        a.sim.total_cmp(&b.sim)
            .then(a.i.cmp(&b.i))
            .then(a.j.cmp(&b.j))
    }
}

/// All pairs with similarity above `floor`, ascending by similarity.
///
/// The store never claims completeness below its floor: a pair missing from the store may
/// still exist with a similarity `<= floor`.
#[derive(Debug, PartialEq, Clone)]
pub struct PairStore {
    records: Vec<PairRecord>,
    floor: f32,
}

impl PairStore {

    /// Takes records in any order. Records at or below `floor` and self pairs are dropped,
    /// `(j, i)` is normalised to `(i, j)`, and duplicates of an unordered pair keep the first
    /// occurrence in sorted order.
    pub fn new(records: Vec<PairRecord>, floor: f32) -> Self {

        let mut records: Vec<PairRecord> = records
            .into_iter()
            .filter(|r| r.i != r.j && r.sim > floor)
            .map(|r| match r.i < r.j {
                true => r,
                false => PairRecord::new(r.j, r.i, r.sim),
            })
            .collect();

        records.sort_unstable_by(PairRecord::order);

        let mut seen = std::collections::HashSet::with_capacity(records.len());
        records.retain(|r| seen.insert((r.i, r.j)));

        return Self { records, floor };
    }

    /// Strict upper triangle of a similarity matrix. Only non-zero entries are kept, so the
    /// floor of the resulting store is 0.
    pub fn from_similarity_matrix(matrix: &SimilarityMatrix) -> Self {

        let mut records: Vec<PairRecord> = Vec::new();

        match matrix {
            SimilarityMatrix::Dense { values, n_items } => {
                for i in 0..*n_items {
                    for j in (i + 1)..*n_items {
                        let sim = values[i * n_items + j];
                        if sim != 0.0 {
                            records.push(PairRecord::new(i, j, sim));
                        }
                    }
                }
            },
            SimilarityMatrix::Sparse(m) => {
                for (sim, (i, j)) in m.iter() {
                    if i < j && *sim != 0.0 {
                        records.push(PairRecord::new(i, j, *sim));
                    }
                }
            },
        }

        debug!("Extracted {} pairs from a {}x{} similarity matrix", records.len(), matrix.len(), matrix.len());

        return Self::new(records, 0.0);
    }

    /// Records with similarity strictly greater than `threshold`.
    pub fn filter(&self, threshold: f64) -> &[PairRecord] {

        let start = self.records.partition_point(|r| (r.sim as f64) <= threshold);
        return &self.records[start..];
    }

    /// Like `filter` but as a store of its own, with the floor raised to `threshold`.
    pub fn filtered(&self, threshold: f64) -> PairStore {

        let floor = self.floor.max(threshold as f32);
        return Self {
            records: self.filter(threshold).to_vec(),
            floor,
        };
    }

    pub fn records(&self) -> &[PairRecord] {
        &self.records
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fails if any pair refers to an item outside `0..n_instances`.
    pub fn check_bounds(&self, n_instances: usize) -> Result<()> {

        for r in self.records.iter() {
            if r.j >= n_instances {
                return Err(Error::PairOutOfRange { i: r.i, j: r.j, n_instances });
            }
        }

        return Ok(());
    }
}
