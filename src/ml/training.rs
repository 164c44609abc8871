//! ML Model Training Pipeline
//!
//! Minibatch Adam training for the trainable variants, the shared split
//! evaluator, and the warm start / pretrain hooks.

use std::path::PathBuf;

use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::network::Network;
use super::optimizer::Adam;
use super::schedule::LearningRateSchedule;
use super::{checkpoint, EpochRecord, EvaluationMetrics, ModelKind, TrainingHistory};
use crate::config::TrainingConfig;
use crate::error::{ForecastError, Result};
use crate::forecast::{mse, smape};

/// Training Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rates: Vec<f64>,
    pub batch_size: usize,
    /// Save the weights at the end of training
    pub pretrain: bool,
    /// Start from previously saved weights
    pub finetune: bool,
    pub weights_dir: PathBuf,
    pub seed: Option<u64>,
    pub validate_each_epoch: bool,
    /// Checked before every epoch
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for TrainOptions {
    fn from(cfg: &TrainingConfig) -> Self {
        Self {
            epochs: cfg.epochs,
            learning_rates: cfg.learning_rates.clone(),
            batch_size: cfg.batch_size,
            pretrain: cfg.pretrain,
            finetune: cfg.finetune,
            weights_dir: cfg.weights_dir.clone(),
            seed: cfg.seed,
            validate_each_epoch: cfg.validate_each_epoch,
            cancel: CancellationToken::new(),
        }
    }
}

/// Validation tensors passed to the training loop
pub type Validation<'a> = Option<(&'a Array3<f64>, &'a Array3<f64>)>;

/// Evaluate `predict` over `x`/`y` in batches.
///
/// Loss (MSE) and SMAPE are averaged per batch and weighted by batch size;
/// an empty split yields zero for both.
pub fn evaluate_with<F>(
    mut predict: F,
    x: &Array3<f64>,
    y: &Array3<f64>,
    batch_size: usize,
) -> Result<EvaluationMetrics>
where
    F: FnMut(&Array3<f64>) -> Result<Array3<f64>>,
{
    let total = x.len_of(Axis(0));
    if y.len_of(Axis(0)) != total {
        return Err(ForecastError::ShapeMismatch {
            context: "evaluation targets",
            expected: vec![total],
            actual: y.shape().to_vec(),
        });
    }
    if total == 0 {
        return Ok(EvaluationMetrics::default());
    }

    let batch_size = batch_size.max(1);
    let mut loss = 0.0;
    let mut smape_sum = 0.0;
    for start in (0..total).step_by(batch_size) {
        let end = (start + batch_size).min(total);
        let xb = x.slice_axis(Axis(0), (start..end).into()).to_owned();
        let yb = y.slice_axis(Axis(0), (start..end).into());
        let prediction = predict(&xb)?;
        if prediction.shape() != yb.shape() {
            return Err(ForecastError::ShapeMismatch {
                context: "evaluation prediction",
                expected: yb.shape().to_vec(),
                actual: prediction.shape().to_vec(),
            });
        }

        let weight = (end - start) as f64;
        loss += mse(&yb, &prediction) * weight;
        smape_sum += smape(&yb, &prediction) * weight;
    }

    Ok(EvaluationMetrics {
        loss: loss / total as f64,
        smape: smape_sum / total as f64,
        samples: total,
    })
}

/// Minibatch training loop shared by the trainable variants.
///
/// Per epoch: set the scheduled learning rate, shuffle, step through the
/// minibatches on the MSE gradient, then optionally evaluate on the
/// validation tensors and report the record to `on_epoch`.
pub fn fit_network<N, C>(
    network: &mut N,
    kind: ModelKind,
    x_train: &Array3<f64>,
    y_train: &Array3<f64>,
    validation: Validation<'_>,
    options: &TrainOptions,
    mut on_epoch: C,
) -> Result<TrainingHistory>
where
    N: Network,
    C: FnMut(&EpochRecord),
{
    let total = x_train.len_of(Axis(0));
    if y_train.len_of(Axis(0)) != total {
        return Err(ForecastError::ShapeMismatch {
            context: "training targets",
            expected: vec![total],
            actual: y_train.shape().to_vec(),
        });
    }

    if options.finetune {
        checkpoint::load_into(&options.weights_dir, kind, network.params_mut())?;
    }

    let schedule = LearningRateSchedule::new(&options.learning_rates)?;
    let mut optimizer = Adam::new(schedule.initial_rate());
    let mut rng = options
        .seed
        .map(StdRng::seed_from_u64)
        .unwrap_or_else(StdRng::from_entropy);
    let batch_size = options.batch_size.max(1);
    let mut order: Vec<usize> = (0..total).collect();
    let mut history = TrainingHistory::default();

    info!(
        model = %kind,
        examples = total,
        epochs = options.epochs,
        batch_size,
        parameters = network.parameter_count(),
        "starting training"
    );

    for epoch in 0..options.epochs {
        if options.cancel.is_cancelled() {
            warn!(model = %kind, epoch, "training cancelled");
            return Err(ForecastError::Cancelled);
        }
        let learning_rate = schedule.rate_at(epoch, options.epochs);
        optimizer.set_learning_rate(learning_rate);
        order.shuffle(&mut rng);

        let mut running_loss = 0.0;
        for batch in order.chunks(batch_size) {
            let xb = x_train.select(Axis(0), batch);
            let yb = y_train.select(Axis(0), batch);

            let (prediction, cache) = network.forward(&xb);
            running_loss += mse(&yb, &prediction) * batch.len() as f64;
            let grad = (&prediction - &yb) * (2.0 / prediction.len() as f64);

            network.zero_grad();
            network.backward(&cache, &grad);
            optimizer.step(network.params_mut());
        }
        let loss = if total > 0 {
            running_loss / total as f64
        } else {
            0.0
        };

        let (val_loss, val_smape) = match validation {
            Some((x_val, y_val)) if options.validate_each_epoch && x_val.len_of(Axis(0)) > 0 => {
                let metrics = evaluate_with(
                    |xb| Ok(network.predict(xb)),
                    x_val,
                    y_val,
                    options.batch_size,
                )?;
                (Some(metrics.loss), Some(metrics.smape))
            }
            _ => (None, None),
        };

        let record = EpochRecord {
            epoch,
            loss,
            val_loss,
            val_smape,
            learning_rate: Some(learning_rate),
        };
        info!(
            model = %kind,
            epoch,
            loss,
            val_loss = ?val_loss,
            val_smape = ?val_smape,
            learning_rate,
            "epoch finished"
        );
        on_epoch(&record);
        history.push(record);
    }

    if options.pretrain {
        let params = network.params();
        checkpoint::save(&options.weights_dir, kind, &params)?;
    }

    Ok(history)
}

/// History reported by the parameter-free variants
pub fn parameter_free_history<C>(mut on_epoch: C) -> TrainingHistory
where
    C: FnMut(&EpochRecord),
{
    let record = EpochRecord {
        epoch: 0,
        loss: 0.0,
        val_loss: None,
        val_smape: None,
        learning_rate: None,
    };
    on_epoch(&record);
    TrainingHistory {
        records: vec![record],
    }
}
