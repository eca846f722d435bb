use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metric::{DistanceMetric, MetricKind};
use crate::optimizer::ThresholdOptimizer;
use crate::similarity::{Jobs, Strategy};

/// Settings for a similarity threshold split, loadable from YAML. Missing keys fall back to
/// the defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Pairs at or below this similarity are never stored. Lower is slower.
    pub min_threshold: f64,
    /// Fraction of the dataset the largest cluster should hold. Decides the final threshold.
    pub largest_cluster_fraction: f64,
    pub similarity_metric: MetricKind,
    /// Compute similarities tile by tile instead of all at once.
    pub memory_optimized: bool,
    /// Worker threads for the tiled computation, -1 for all cores.
    pub n_jobs: i32,
    /// Width of the tiles when `memory_optimized` is set.
    pub block_width: usize,
    /// Absolute tolerance of the threshold search.
    pub xatol: f64,
    pub max_evaluations: usize,
    pub verbose: bool,
}

impl Default for SplitConfig {

    fn default() -> Self {

        return Self {
            min_threshold: 0.45,
            largest_cluster_fraction: 0.1,
            similarity_metric: MetricKind::Jaccard,
            memory_optimized: true,
            n_jobs: 1,
            block_width: 1000,
            xatol: 1e-5,
            max_evaluations: 500,
            verbose: false,
        }
    }
}

impl SplitConfig {

    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {

        let serialized = std::fs::read_to_string(filename)?;
        let deserialized: Self = serde_yaml::from_str(&serialized)?;
        deserialized.validate()?;

        return Ok(deserialized);
    }

    pub fn to_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {

        let serialized = serde_yaml::to_string(&self)?;
        let mut file = File::create(filename)?;
        file.write_all(serialized.as_bytes())?;

        return Ok(());
    }

    /// Checks the settings that do not depend on the data. The block width is checked
    /// against the item count at fit time.
    pub fn validate(&self) -> Result<()> {

        if !(0.0..=1.0).contains(&self.min_threshold) {
            return Err(Error::InvalidConfig(format!("min_threshold must be in [0, 1], got {}", self.min_threshold)));
        }

        if !(self.largest_cluster_fraction > 0.0 && self.largest_cluster_fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "largest_cluster_fraction must be in (0, 1], got {}", self.largest_cluster_fraction)));
        }

        if self.block_width == 0 {
            return Err(Error::InvalidConfig("block_width must be positive".to_string()));
        }

        if !(self.xatol > 0.0) {
            return Err(Error::InvalidConfig(format!("xatol must be positive, got {}", self.xatol)));
        }

        if self.max_evaluations == 0 {
            return Err(Error::InvalidConfig("max_evaluations must be positive".to_string()));
        }

        Jobs::from_n_jobs(self.n_jobs)?;

        return Ok(());
    }

    pub fn strategy(&self) -> Result<Strategy> {

        let strategy = match self.memory_optimized {
            true => Strategy::Blocked {
                block_width: self.block_width,
                jobs: Jobs::from_n_jobs(self.n_jobs)?,
            },
            false => Strategy::Dense,
        };

        return Ok(strategy);
    }

    pub fn metric(&self) -> DistanceMetric {
        DistanceMetric::Named(self.similarity_metric)
    }

    pub fn optimizer(&self) -> ThresholdOptimizer {

        let mut optimizer = ThresholdOptimizer::new(self.min_threshold, self.largest_cluster_fraction);
        optimizer.xatol = self.xatol;
        optimizer.max_evaluations = self.max_evaluations;

        return optimizer;
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn yaml_round_trip_through_file() {

        let mut config = SplitConfig::default();
        config.similarity_metric = MetricKind::Dice;
        config.block_width = 250;
        config.n_jobs = -1;

        let filename = std::env::temp_dir().join("sim_split_config_test.yaml");
        config.to_file(&filename).unwrap();
        let loaded = SplitConfig::from_file(&filename).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_keys_take_defaults() {

        let config: SplitConfig = serde_yaml::from_str("min_threshold: 0.6\nsimilarity_metric: tanimoto\n").unwrap();

        assert_eq!(config.min_threshold, 0.6);
        assert_eq!(config.similarity_metric, MetricKind::Jaccard);
        assert_eq!(config.block_width, 1000);
        assert!(config.memory_optimized);
    }

    #[test]
    fn validation_catches_bad_values() {

        let mut config = SplitConfig::default();
        assert!(config.validate().is_ok());

        config.largest_cluster_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = SplitConfig::default();
        config.min_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = SplitConfig::default();
        config.n_jobs = 0;
        assert!(config.validate().is_err());

        let mut config = SplitConfig::default();
        config.block_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn strategy_follows_memory_flag() {

        let mut config = SplitConfig::default();
        assert_eq!(config.strategy().unwrap(), Strategy::Blocked { block_width: 1000, jobs: Jobs::Sequential });

        config.memory_optimized = false;
        assert_eq!(config.strategy().unwrap(), Strategy::Dense);
    }
}
