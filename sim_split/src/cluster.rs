//! Assigns items to clusters given pairs that are already above the working threshold.
//!
//! Every item starts in its own cluster, labelled with its own index. Linked items end up
//! sharing the smallest index of their connected component, whatever order the pairs come
//! in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::ItemIndex;
use crate::pairs::PairRecord;

pub type ClusterId = usize;

/// Disjoint set forest with union by rank and path compression. Each root also tracks the
/// smallest item index in its set, which is what gets reported as the cluster id.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    min_member: Vec<usize>,
}

impl UnionFind {

    pub fn new(n: usize) -> Self {

        return Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            min_member: (0..n).collect(),
        }
    }

    pub fn find(&mut self, x: usize) -> usize {

        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // second pass points the whole path at the root
        let mut curr = x;
        while self.parent[curr] != root {
            let next = self.parent[curr];
            self.parent[curr] = root;
            curr = next;
        }

        return root;
    }

    pub fn union(&mut self, a: usize, b: usize) {

        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }

        let (big, small) = match self.rank[ra] >= self.rank[rb] {
            true => (ra, rb),
            false => (rb, ra),
        };

        self.parent[small] = big;
        if self.rank[big] == self.rank[small] {
            self.rank[big] += 1;
        }
        self.min_member[big] = self.min_member[big].min(self.min_member[small]);
    }

    /// Flattens the forest to one label per item.
    pub fn labels(&mut self) -> Vec<ClusterId> {

        let n = self.parent.len();
        let mut labels: Vec<ClusterId> = Vec::with_capacity(n);
        for x in 0..n {
            let root = self.find(x);
            labels.push(self.min_member[root]);
        }

        return labels;
    }
}

/// Cluster ids for `n_instances` items linked by `pairs`.
pub fn assign_clusters<'a, I>(n_instances: usize, pairs: I) -> Clusters
where
    I: IntoIterator<Item = &'a PairRecord>,
{
    let mut forest = UnionFind::new(n_instances);
    for pair in pairs {
        forest.union(pair.i, pair.j);
    }

    return Clusters { ids: forest.labels() };
}

/// Relabeling reference: for every pair, every item carrying the larger of the two labels is
/// moved to the smaller one. O(pairs * n); gives the same output as `assign_clusters`.
pub fn assign_clusters_relabel<'a, I>(n_instances: usize, pairs: I) -> Clusters
where
    I: IntoIterator<Item = &'a PairRecord>,
{
    let mut clustered: Vec<ClusterId> = (0..n_instances).collect();

    for pair in pairs {
        let i_clust = clustered[pair.i];
        let j_clust = clustered[pair.j];

        let (keep, replace) = match i_clust < j_clust {
            true => (i_clust, j_clust),
            false => (j_clust, i_clust),
        };

        for c in clustered.iter_mut() {
            if *c == replace {
                *c = keep;
            }
        }
    }

    return Clusters { ids: clustered };
}

/// A cluster id per item, in item order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Clusters {
    ids: Vec<ClusterId>,
}

impl Clusters {

    pub fn singletons(n_instances: usize) -> Self {
        Self { ids: (0..n_instances).collect() }
    }

    pub fn ids(&self) -> &[ClusterId] {
        &self.ids
    }

    pub fn get(&self, item: ItemIndex) -> ClusterId {
        self.ids[item]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of items per cluster, ordered by cluster id.
    pub fn sizes(&self) -> BTreeMap<ClusterId, usize> {

        let mut sizes: BTreeMap<ClusterId, usize> = BTreeMap::new();
        for id in self.ids.iter() {
            *sizes.entry(*id).or_insert(0) += 1;
        }

        return sizes;
    }

    pub fn n_clusters(&self) -> usize {
        self.sizes().len()
    }

    pub fn max_cluster_size(&self) -> usize {
        self.sizes().values().copied().max().unwrap_or(0)
    }

    /// Items of each cluster, ordered by cluster id.
    pub fn members(&self) -> BTreeMap<ClusterId, Vec<ItemIndex>> {

        let mut members: BTreeMap<ClusterId, Vec<ItemIndex>> = BTreeMap::new();
        for (item, id) in self.ids.iter().enumerate() {
            members.entry(*id).or_default().push(item);
        }

        return members;
    }
}
