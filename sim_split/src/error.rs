use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the block width ({block_width}) should be less than or equal to the number of instances ({n_instances})")]
    BlockWidthExceedsInstances { block_width: usize, n_instances: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("dimensionality reducer {0} not available")]
    UnsupportedReducer(String),

    #[error("unknown similarity metric: {0}")]
    UnknownMetric(String),

    #[error("no instances to fit")]
    EmptyDataset,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("similarity matrix must be square, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },

    #[error("pair ({i}, {j}) out of range for {n_instances} instances")]
    PairOutOfRange { i: usize, j: usize, n_instances: usize },

    #[error("invalid ratio: {0}")]
    InvalidRatio(String),

    #[error("the number of folds must be at least 1")]
    InvalidFolds,

    #[error("splitter has not been fitted")]
    NotFitted,

    #[error("no fingerprints available; fit was given a similarity matrix")]
    NoFingerprints,

    #[error("featurizer failed: {0}")]
    Featurizer(String),

    #[error("malformed pair file: {0}")]
    MalformedPairFile(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("could not build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
