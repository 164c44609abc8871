use std::path::PathBuf;

use thiserror::Error;

use crate::forecast::DatasetSplit;

/// Fatal conditions raised by the data pipeline and the model harness.
///
/// Every variant is a configuration or contract violation; none of them is
/// recovered from inside the crate.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Unknown model variant: {0}")]
    UnknownModel(String),

    #[error("Power profile contains no samples")]
    EmptyProfile,

    #[error("Misaligned time configuration: {0}")]
    Misaligned(String),

    #[error("Invalid split configuration: {0}")]
    InvalidSplit(String),

    #[error("Training split is empty, normalization cannot be fitted")]
    EmptyTrainingSplit,

    #[error("Normalization leads to division by zero: target series has zero variance")]
    ZeroVarianceTarget,

    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Index {index} out of range for {split} split of length {len}")]
    IndexOutOfRange {
        split: DatasetSplit,
        index: usize,
        len: usize,
    },

    #[error("Persistence forecasting requires the lagged power feature")]
    LaggedPowerRequired,

    #[error("Model has not been trained")]
    NotTrained,

    #[error("Invalid learning rate schedule: {0}")]
    InvalidSchedule(String),

    #[error("Pretrained weights not found at {}", .0.display())]
    MissingPretrainedWeights(PathBuf),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
