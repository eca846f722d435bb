//! Turns a cluster assignment into split masks. Clusters are never divided between splits.

use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::cluster::{ClusterId, Clusters};
use crate::data::ItemIndex;
use crate::error::{Error, Result};

/// Boolean membership over the input item order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SplitMask(Vec<bool>);

impl SplitMask {

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn contains(&self, item: ItemIndex) -> bool {
        self.0[item]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of items in the split.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|x| **x).count()
    }

    pub fn indices(&self) -> Vec<ItemIndex> {
        self.0.iter().enumerate().filter(|(_, x)| **x).map(|(i, _)| i).collect()
    }

    pub fn complement(&self) -> SplitMask {
        SplitMask(self.0.iter().map(|x| !x).collect())
    }
}

/// Target number of items per split, proportional to `ratio` and summing to `n_instances`.
pub fn split_sizes(ratio: &[f64], n_instances: usize) -> Result<Vec<f64>> {

    if ratio.is_empty() {
        return Err(Error::InvalidRatio("at least one split is needed".to_string()));
    }

    if ratio.iter().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(Error::InvalidRatio(format!("weights must be finite and nonnegative, got {:?}", ratio)));
    }

    let total: f64 = ratio.iter().sum();
    if total <= 0.0 {
        return Err(Error::InvalidRatio(format!("weights must not all be zero, got {:?}", ratio)));
    }

    return Ok(ratio.iter().map(|r| n_instances as f64 * r / total).collect());
}

/// Splits the clustered items according to `ratio`.
///
/// The clusters are shuffled with `rng` and their sizes accumulated in that order. A cluster
/// goes to the split whose cumulative interval `(lower, upper]` holds the running total, so
/// the sizes only approximate the ratio.
pub fn split<R: Rng + ?Sized>(clusters: &Clusters, ratio: &[f64], rng: &mut R) -> Result<Vec<SplitMask>> {

    let n_instances = clusters.len();
    let sizes = split_sizes(ratio, n_instances)?;

    let mut upper_bounds: Vec<f64> = sizes
        .iter()
        .scan(0.0, |acc, s| { *acc += s; Some(*acc) })
        .collect();
    // the running total always reaches n, whatever rounding did to the last bound
    if let Some(last) = upper_bounds.last_mut() {
        *last = f64::INFINITY;
    }

    let cluster_sizes = clusters.sizes();
    let mut order: Vec<(ClusterId, usize)> = cluster_sizes.into_iter().collect();
    order.shuffle(rng);

    let mut assignment: std::collections::HashMap<ClusterId, usize> = std::collections::HashMap::with_capacity(order.len());
    let mut cumsum: usize = 0;
    for (id, size) in order {
        cumsum += size;
        let split_index = upper_bounds
            .iter()
            .position(|upper| cumsum as f64 <= *upper)
            .unwrap_or(sizes.len() - 1);

        if size as f64 > sizes[split_index] {
            warn!("Cluster {} of size {} exceeds the target size {:.1} of split {}", id, size, sizes[split_index], split_index);
        }
        assignment.insert(id, split_index);
    }

    let mut masks: Vec<Vec<bool>> = vec![vec![false; n_instances]; sizes.len()];
    for (item, id) in clusters.ids().iter().enumerate() {
        masks[assignment[id]][item] = true;
    }

    let masks: Vec<SplitMask> = masks.into_iter().map(SplitMask).collect();
    info!("Split sizes: {:?} (requested {:?})", masks.iter().map(|m| m.count()).collect::<Vec<_>>(), sizes);

    return Ok(masks);
}

/// `(train, test)` masks for each of `n_folds` folds. The test masks are disjoint and cover
/// every item; each train mask is the complement of its test mask.
pub fn k_fold<R: Rng + ?Sized>(clusters: &Clusters, n_folds: usize, rng: &mut R) -> Result<Vec<(SplitMask, SplitMask)>> {

    if n_folds == 0 {
        return Err(Error::InvalidFolds);
    }

    let folds = split(clusters, &vec![1.0; n_folds], rng)?;
    return Ok(folds.into_iter().map(|fold| (fold.complement(), fold)).collect());
}
