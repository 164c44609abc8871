//! ML Model Implementations
//!
//! - Parameter-free: nearest neighbour and persistence
//! - Trainable: bidirectional LSTM, transformer encoder, residual LSTM stack

use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::layers::Param;
use super::network::Network;
use super::training::{evaluate_with, fit_network, parameter_free_history, TrainOptions, Validation};
use super::{EpochRecord, EvaluationMetrics, ModelKind, TrainingHistory};
use crate::error::{ForecastError, Result};
use crate::forecast::{NormalizationState, TransformedData};

pub mod extended_memory;
pub mod knn;
pub mod persistence;
pub mod recurrent;
pub mod transformer;

pub use extended_memory::*;
pub use knn::*;
pub use persistence::*;
pub use recurrent::*;
pub use transformer::*;

/// Dataset facts a model is built against
#[derive(Debug, Clone)]
pub struct ModelContext {
    pub num_features: usize,
    pub timesteps_in: usize,
    pub timesteps_out: usize,
    pub lagged_power_column: Option<usize>,
    pub normalization: NormalizationState,
    pub seed: Option<u64>,
}

impl ModelContext {
    pub fn from_data(data: &TransformedData, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            num_features: data.nr_of_features(),
            timesteps_in: data.timesteps_in(),
            timesteps_out: data.timesteps_out(),
            lagged_power_column: data.layout.lagged_power_column(),
            normalization: data.fitted_normalization()?.clone(),
            seed,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Model {
    Knn(KnnModel),
    Persistence(PersistenceModel),
    Recurrent(RecurrentNet),
    Transformer(TransformerNet),
    ExtendedMemory(ExtendedMemoryNet),
}

impl Model {
    pub fn new(kind: ModelKind, ctx: &ModelContext) -> Result<Self> {
        if ctx.timesteps_out > ctx.timesteps_in {
            return Err(ForecastError::ShapeMismatch {
                context: "model window lengths",
                expected: vec![ctx.timesteps_in],
                actual: vec![ctx.timesteps_out],
            });
        }

        let mut rng = ctx
            .seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);
        let model = match kind {
            ModelKind::Knn => Model::Knn(KnnModel::new()),
            ModelKind::Persistence => Model::Persistence(PersistenceModel::new(
                ctx.lagged_power_column,
                ctx.timesteps_out,
                ctx.normalization.clone(),
            )?),
            ModelKind::RecurrentNet => {
                Model::Recurrent(RecurrentNet::new(ctx.num_features, ctx.timesteps_out, &mut rng))
            }
            ModelKind::TransformerNet => Model::Transformer(TransformerNet::new(
                ctx.num_features,
                ctx.timesteps_out,
                &mut rng,
            )),
            ModelKind::ExtendedMemoryNet => Model::ExtendedMemory(ExtendedMemoryNet::new(
                ctx.num_features,
                ctx.timesteps_out,
                &mut rng,
            )),
        };

        info!(
            model = %kind,
            parameters = model.parameter_count(),
            features = ctx.num_features,
            timesteps_in = ctx.timesteps_in,
            timesteps_out = ctx.timesteps_out,
            "built model"
        );
        Ok(model)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Knn(_) => ModelKind::Knn,
            Model::Persistence(_) => ModelKind::Persistence,
            Model::Recurrent(_) => ModelKind::RecurrentNet,
            Model::Transformer(_) => ModelKind::TransformerNet,
            Model::ExtendedMemory(_) => ModelKind::ExtendedMemoryNet,
        }
    }

    /// Trainable parameters; empty for the parameter-free variants
    pub fn params(&self) -> Vec<&Param> {
        match self {
            Model::Knn(_) | Model::Persistence(_) => Vec::new(),
            Model::Recurrent(net) => net.params(),
            Model::Transformer(net) => net.params(),
            Model::ExtendedMemory(net) => net.params(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.params().iter().map(|p| p.len()).sum()
    }

    /// Inference-mode forward pass on normalized inputs
    pub fn predict(&self, x: &Array3<f64>) -> Result<Array3<f64>> {
        self.check_input(x)?;
        match self {
            Model::Knn(model) => model.predict(x),
            Model::Persistence(model) => model.predict(x),
            Model::Recurrent(net) => Ok(net.predict(x)),
            Model::Transformer(net) => Ok(net.predict(x)),
            Model::ExtendedMemory(net) => Ok(net.predict(x)),
        }
    }

    /// Fit the model on the training tensors.
    ///
    /// Parameter-free variants store or derive their state and report a
    /// single zero-loss record.
    pub fn train_model<C>(
        &mut self,
        x_train: &Array3<f64>,
        y_train: &Array3<f64>,
        validation: Validation<'_>,
        options: &TrainOptions,
        on_epoch: C,
    ) -> Result<TrainingHistory>
    where
        C: FnMut(&EpochRecord),
    {
        self.check_input(x_train)?;
        let kind = self.kind();
        match self {
            Model::Knn(model) => {
                model.train_model(x_train, y_train)?;
                Ok(parameter_free_history(on_epoch))
            }
            Model::Persistence(_) => Ok(parameter_free_history(on_epoch)),
            Model::Recurrent(net) => {
                fit_network(net, kind, x_train, y_train, validation, options, on_epoch)
            }
            Model::Transformer(net) => {
                fit_network(net, kind, x_train, y_train, validation, options, on_epoch)
            }
            Model::ExtendedMemory(net) => {
                fit_network(net, kind, x_train, y_train, validation, options, on_epoch)
            }
        }
    }

    pub fn evaluate(
        &self,
        x: &Array3<f64>,
        y: &Array3<f64>,
        batch_size: usize,
    ) -> Result<EvaluationMetrics> {
        evaluate_with(|xb| self.predict(xb), x, y, batch_size)
    }

    fn check_input(&self, x: &Array3<f64>) -> Result<()> {
        let features = x.len_of(Axis(2));
        let expected = match self {
            Model::Knn(model) => {
                let trailing = (x.len_of(Axis(1)), features);
                return match model.window_shape() {
                    Some(window) if window != trailing => Err(ForecastError::ShapeMismatch {
                        context: "nearest neighbour query",
                        expected: vec![x.len_of(Axis(0)), window.0, window.1],
                        actual: x.shape().to_vec(),
                    }),
                    _ => Ok(()),
                };
            }
            Model::Persistence(model) => model.nr_of_features(),
            Model::Recurrent(net) => net.first.fwd.input_size(),
            Model::Transformer(net) => net.projection.input_dim(),
            Model::ExtendedMemory(net) => net.projection.input_dim(),
        };
        if features != expected {
            return Err(ForecastError::FeatureCountMismatch {
                expected,
                actual: features,
            });
        }
        Ok(())
    }
}
