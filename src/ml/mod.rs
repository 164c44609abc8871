//! Machine Learning Module
//!
//! Forecasting models operating on the normalized example tensors:
//! - Nearest-neighbour lookup and a persistence baseline (parameter-free)
//! - Bidirectional LSTM, transformer encoder and residual LSTM stack
//!   (trained with Adam on a staged learning-rate schedule)
//!
//! # Architecture
//! - `layers`: ndarray layers with explicit backward passes
//! - `network`: forward/backward contract shared by the trainable variants
//! - `training`: minibatch loop, evaluation and warm start / persistence
//! - `checkpoint`: bincode weight files keyed by model variant

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{ForecastError, Result};

pub mod checkpoint;
pub mod layers;
pub mod models;
pub mod network;
pub mod optimizer;
pub mod schedule;
pub mod training;

pub use models::{Model, ModelContext};
pub use network::Network;
pub use schedule::LearningRateSchedule;
pub use training::TrainOptions;

/// Forecasting model variant
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ModelKind {
    #[strum(to_string = "Knn", serialize = "NearestNeighbour")]
    Knn,
    #[strum(to_string = "Persistence", serialize = "PersistencePrediction")]
    Persistence,
    #[strum(to_string = "RecurrentNet", serialize = "LSTM")]
    RecurrentNet,
    #[strum(to_string = "TransformerNet", serialize = "Transformer")]
    TransformerNet,
    #[strum(to_string = "ExtendedMemoryNet", serialize = "xLSTM")]
    ExtendedMemoryNet,
}

/// Whether a variant learns parameters by gradient descent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    ParameterFree,
    Trainable,
}

impl ModelKind {
    /// Parse a model identifier; unknown identifiers are a configuration error
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse()
            .map_err(|_| ForecastError::UnknownModel(name.to_string()))
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelKind::Knn | ModelKind::Persistence => ModelFamily::ParameterFree,
            ModelKind::RecurrentNet | ModelKind::TransformerNet | ModelKind::ExtendedMemoryNet => {
                ModelFamily::Trainable
            }
        }
    }

    pub fn is_trainable(&self) -> bool {
        self.family() == ModelFamily::Trainable
    }
}

/// Mean loss and SMAPE over one split, weighted by example count
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f64,
    pub smape: f64,
    pub samples: usize,
}

/// Metrics reported after every epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub val_loss: Option<f64>,
    pub val_smape: Option<f64>,
    pub learning_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub records: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.records.last().map(|r| r.loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case("Knn", ModelKind::Knn)]
    #[case("KNN", ModelKind::Knn)]
    #[case("PersistencePrediction", ModelKind::Persistence)]
    #[case("LSTM", ModelKind::RecurrentNet)]
    #[case("transformer", ModelKind::TransformerNet)]
    #[case("xLSTM", ModelKind::ExtendedMemoryNet)]
    #[case(" ExtendedMemoryNet ", ModelKind::ExtendedMemoryNet)]
    fn test_parse_model_kind(#[case] name: &str, #[case] expected: ModelKind) {
        assert_eq!(ModelKind::parse(name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(matches!(
            ModelKind::parse("ARIMA"),
            Err(ForecastError::UnknownModel(name)) if name == "ARIMA"
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for kind in ModelKind::iter() {
            assert_eq!(ModelKind::parse(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(ModelKind::Knn.family(), ModelFamily::ParameterFree);
        assert!(ModelKind::TransformerNet.is_trainable());
    }
}
