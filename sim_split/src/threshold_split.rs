//! Similarity threshold splitting of a dataset.
//!
//! Items whose similarity is above a threshold are pooled into the same cluster, and whole
//! clusters are assigned to splits. The threshold is picked so that the largest cluster holds
//! roughly `largest_cluster_fraction` of the dataset, since the density of items varies from
//! dataset to dataset. Random splits put near duplicates of training items into the test set;
//! this keeps every such pair on one side.

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterId, Clusters};
use crate::config::SplitConfig;
use crate::data::{FingerprintMatrix, FitInput, ItemIndex};
use crate::embedding::DimReducer;
use crate::error::{Error, Result};
use crate::metric::DistanceMetric;
use crate::pairs::PairStore;
use crate::similarity::SimilarityEngine;
use crate::splitter::{self, SplitMask};

/// Everything a `fit` produces. Replaced wholesale by the next `fit`.
#[derive(Debug, Clone)]
pub struct FittedState {
    /// External label of each item, in item order.
    pub index: Vec<String>,
    /// `None` when the fit started from a similarity matrix.
    pub fps: Option<FingerprintMatrix>,
    pub pairs: PairStore,
    pub threshold: f64,
    pub clusters: Clusters,
    /// `|largest cluster - target|` at `threshold`.
    pub deviation: f64,
    pub evaluations: usize,
}

impl FittedState {

    pub fn n_instances(&self) -> usize {
        self.clusters.len()
    }

    pub fn summary(&self) -> FitSummary {

        return FitSummary {
            n_instances: self.n_instances(),
            n_pairs: self.pairs.len(),
            threshold: self.threshold,
            n_clusters: self.clusters.n_clusters(),
            largest_cluster: self.clusters.max_cluster_size(),
            clusters: self.index.iter().cloned().zip(self.clusters.ids().iter().copied()).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub n_instances: usize,
    pub n_pairs: usize,
    pub threshold: f64,
    pub n_clusters: usize,
    pub largest_cluster: usize,
    /// `(label, cluster id)` in item order.
    pub clusters: Vec<(String, ClusterId)>,
}

impl FitSummary {

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self)?)
    }
}

/// Histogram of pairwise similarities on `[0, 1]`, with the fitted threshold for reference.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimilarityHistogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct SimThresholdSplit {
    pub config: SplitConfig,
    pub metric: DistanceMetric,
    fitted: Option<FittedState>,
}

impl SimThresholdSplit {

    pub fn new(config: SplitConfig) -> Result<Self> {

        config.validate()?;
        let metric = config.metric();

        return Ok(Self { config, metric, fitted: None });
    }

    /// Replaces the configured named metric with any other distance. From then on
    /// `config.similarity_metric` is ignored.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Fits on `input`, labelling items by their position.
    pub fn fit<T>(&mut self, input: FitInput<T>) -> Result<&FittedState> {
        self.fit_inner(input, None)
    }

    /// Fits on `input` with one external label per item.
    pub fn fit_labeled<T>(&mut self, input: FitInput<T>, labels: Vec<String>) -> Result<&FittedState> {
        self.fit_inner(input, Some(labels))
    }

    fn fit_inner<T>(&mut self, input: FitInput<T>, labels: Option<Vec<String>>) -> Result<&FittedState> {

        self.config.validate()?;

        let n_instances = input.len();
        if n_instances == 0 {
            return Err(Error::EmptyDataset);
        }
        // holds for every input kind, not only the tiled computation
        if n_instances < self.config.block_width {
            return Err(Error::BlockWidthExceedsInstances { block_width: self.config.block_width, n_instances });
        }

        let index = match labels {
            Some(labels) if labels.len() != n_instances => {
                return Err(Error::DimensionMismatch { expected: n_instances, got: labels.len() });
            },
            Some(labels) => labels,
            None => (0..n_instances).map(|i| i.to_string()).collect(),
        };

        let (fps, pairs) = match input {
            FitInput::RawItems { items, featurizer } => {
                let fps = featurizer.transform(items)?;
                if fps.len() != n_instances {
                    return Err(Error::Featurizer(format!("{} items gave {} fingerprints", n_instances, fps.len())));
                }
                let pairs = self.pairs_from_fps(&fps)?;
                (Some(fps), pairs)
            },
            FitInput::Fingerprints(fps) => {
                let pairs = self.pairs_from_fps(&fps)?;
                (Some(fps), pairs)
            },
            FitInput::SimilarityMatrix(matrix) => {
                (None, PairStore::from_similarity_matrix(&matrix))
            },
            FitInput::FingerprintsWithPairs(fps, pairs) => {
                pairs.check_bounds(n_instances)?;
                (Some(fps), pairs)
            },
        };

        if pairs.is_empty() {
            warn!("No pairs above the minimum threshold; every item will be its own cluster");
        }

        let fit = self.config.optimizer().optimize(&pairs, n_instances);
        info!("{} instances in {} clusters, largest {}", n_instances, fit.clusters.n_clusters(), fit.clusters.max_cluster_size());

        self.fitted = Some(FittedState {
            index,
            fps,
            pairs,
            threshold: fit.threshold,
            clusters: fit.clusters,
            deviation: fit.deviation,
            evaluations: fit.evaluations,
        });

        return self.fitted();
    }

    fn pairs_from_fps(&self, fps: &FingerprintMatrix) -> Result<PairStore> {

        let mut engine = SimilarityEngine::new(self.metric.clone(), self.config.min_threshold as f32, self.config.strategy()?);
        engine.verbose = self.config.verbose;

        return engine.compute(fps);
    }

    pub fn fitted(&self) -> Result<&FittedState> {
        self.fitted.as_ref().ok_or(Error::NotFitted)
    }

    pub fn threshold(&self) -> Result<f64> {
        Ok(self.fitted()?.threshold)
    }

    pub fn clusters(&self) -> Result<&Clusters> {
        Ok(&self.fitted()?.clusters)
    }

    /// Split masks for `ratio`, e.g. `&[70.0, 15.0, 15.0]` for train, valid and test.
    pub fn split<R: Rng + ?Sized>(&self, ratio: &[f64], rng: &mut R) -> Result<Vec<SplitMask>> {
        splitter::split(self.clusters()?, ratio, rng)
    }

    /// `(train, test)` masks for each fold.
    pub fn k_fold<R: Rng + ?Sized>(&self, n_folds: usize, rng: &mut R) -> Result<Vec<(SplitMask, SplitMask)>> {
        splitter::k_fold(self.clusters()?, n_folds, rng)
    }

    /// Labels of the items in each split.
    pub fn split_labels<R: Rng + ?Sized>(&self, ratio: &[f64], rng: &mut R) -> Result<Vec<Vec<String>>> {

        let fitted = self.fitted()?;
        let masks = self.split(ratio, rng)?;

        return Ok(masks
            .iter()
            .map(|mask| mask.indices().into_iter().map(|i| fitted.index[i].clone()).collect())
            .collect());
    }

    fn subsample<R: Rng + ?Sized>(&self, subsample: Option<usize>, rng: &mut R) -> Result<(Vec<ItemIndex>, FingerprintMatrix)> {

        let fps = self.fitted()?.fps.as_ref().ok_or(Error::NoFingerprints)?;

        let mut indices: Vec<ItemIndex> = match subsample {
            Some(k) if k < fps.len() => rand::seq::index::sample(rng, fps.len(), k).into_vec(),
            _ => (0..fps.len()).collect(),
        };
        indices.sort_unstable();

        let selected = fps.select(&indices);
        return Ok((indices, selected));
    }

    /// Histogram of the similarities between at most `subsample` randomly chosen items.
    pub fn similarity_histogram<R: Rng + ?Sized>(&self, subsample: Option<usize>, bins: usize, rng: &mut R) -> Result<SimilarityHistogram> {

        if bins == 0 {
            return Err(Error::InvalidConfig("histogram needs at least one bin".to_string()));
        }

        let threshold = self.threshold()?;
        let (_, fps) = self.subsample(subsample, rng)?;

        let mut counts = vec![0usize; bins];
        for i in 0..fps.len() {
            for j in (i + 1)..fps.len() {
                let sim = self.metric.similarity(fps.row(i), fps.row(j)).clamp(0.0, 1.0) as f64;
                let bin = ((sim * bins as f64) as usize).min(bins - 1);
                counts[bin] += 1;
            }
        }

        let edges: Vec<f64> = (0..=bins).map(|k| k as f64 / bins as f64).collect();
        return Ok(SimilarityHistogram { edges, counts, threshold });
    }

    /// Two dimensional coordinates for at most `subsample` randomly chosen items, returned
    /// with the indices of the items they belong to.
    pub fn embed_space<R: Rng + ?Sized>(&self, reducer: &DimReducer, subsample: Option<usize>, rng: &mut R) -> Result<(Vec<ItemIndex>, Vec<[f64; 2]>)> {

        let (indices, fps) = self.subsample(subsample, rng)?;
        let coords = reducer.fit_transform(&fps, rng);

        return Ok((indices, coords));
    }
}
