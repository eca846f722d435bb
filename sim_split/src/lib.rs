//! Dataset splitting that keeps similar items on the same side of a split.
//!
//! Pairwise similarities above a floor are computed once ([`similarity`]), the threshold that
//! makes the largest cluster hit a target fraction of the dataset is searched for
//! ([`optimizer`]), and whole clusters are then dealt out to splits or folds ([`splitter`]).
//! [`threshold_split::SimThresholdSplit`] ties the steps together.

pub mod cluster;
pub mod config;
pub mod data;
pub mod embedding;
pub mod error;
pub mod io;
pub mod layout;
pub mod metric;
pub mod optimizer;
pub mod pairs;
pub mod similarity;
pub mod splitter;
pub mod threshold_split;

pub use config::SplitConfig;
pub use data::{FingerprintMatrix, FitInput, SimilarityMatrix};
pub use error::{Error, Result};
pub use threshold_split::SimThresholdSplit;
