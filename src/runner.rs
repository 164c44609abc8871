//! Experiment runner
//!
//! Builds the dataset once, then trains and evaluates every configured model
//! variant on it and writes a JSON summary next to the model weights.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{PowerProfile, WeatherSeries};
use crate::forecast::{DatasetSplit, ForecastMetrics, ModelAdapter, TransformedData};
use crate::ml::{EvaluationMetrics, Model, ModelContext, ModelKind, TrainOptions, TrainingHistory};
use crate::simulation;

/// Results of one model variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: ModelKind,
    pub parameters: usize,
    pub history: TrainingHistory,
    pub dev: EvaluationMetrics,
    pub test: EvaluationMetrics,
    /// Test metrics on denormalized (kW) values; absent for an empty test split
    pub test_kw: Option<ForecastMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub examples: usize,
    pub features: usize,
    pub timesteps_in: usize,
    pub timesteps_out: usize,
    pub train_examples: usize,
    pub dev_examples: usize,
    pub test_examples: usize,
    pub first_anchor: NaiveDateTime,
    pub reports: Vec<ModelReport>,
}

impl RunSummary {
    pub fn report(&self, kind: ModelKind) -> Option<&ModelReport> {
        self.reports.iter().find(|r| r.model == kind)
    }
}

/// Run the configured experiment on synthetic data.
///
/// `cancel` is checked between models and before every training epoch; a
/// cancelled run returns [`crate::ForecastError::Cancelled`] and writes no summary.
pub fn run_experiment(cfg: &Config, cancel: &CancellationToken) -> Result<RunSummary> {
    let profile = simulation::synthetic_load_profile(&cfg.simulation);
    let weather = if cfg.simulation.with_weather {
        let interval = chrono::Duration::minutes(cfg.data.sampling_minutes);
        Some(simulation::synthetic_weather(&cfg.simulation, interval).context("generating weather")?)
    } else {
        None
    };

    let summary = run_on(cfg, &profile, weather.as_ref(), cancel)?;
    let path = write_summary(cfg, &summary)?;
    info!(path = %path.display(), "wrote run summary");
    Ok(summary)
}

/// Train and evaluate every configured model on `profile`
pub fn run_on(
    cfg: &Config,
    profile: &PowerProfile,
    weather: Option<&WeatherSeries>,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    let kinds = cfg
        .training
        .models
        .iter()
        .map(|name| ModelKind::parse(name))
        .collect::<crate::Result<Vec<_>>>()
        .context("parsing model list")?;

    let adapter = ModelAdapter::new(&cfg.data).context("building data adapter")?;
    let data = adapter
        .transform_data(profile, weather)
        .context("transforming power profile into examples")?;

    let options = TrainOptions {
        cancel: cancel.clone(),
        ..TrainOptions::from(&cfg.training)
    };
    let ctx = ModelContext::from_data(&data, cfg.training.seed)
        .context("series too short for a single training example")?;
    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if cancel.is_cancelled() {
            warn!(model = %kind, completed = reports.len(), "run cancelled");
            return Err(crate::ForecastError::Cancelled.into());
        }
        let report = run_model(kind, &ctx, &data, &options)
            .with_context(|| format!("running model {}", kind))?;
        reports.push(report);
    }

    Ok(RunSummary {
        run_id: Uuid::new_v4(),
        started_at,
        examples: data.nr_of_examples(),
        features: data.nr_of_features(),
        timesteps_in: data.timesteps_in(),
        timesteps_out: data.timesteps_out(),
        train_examples: data.partition.len(DatasetSplit::Train),
        dev_examples: data.partition.len(DatasetSplit::Dev),
        test_examples: data.partition.len(DatasetSplit::Test),
        first_anchor: data.first_anchor,
        reports,
    })
}

fn run_model(
    kind: ModelKind,
    ctx: &ModelContext,
    data: &TransformedData,
    options: &TrainOptions,
) -> Result<ModelReport> {
    let mut model = Model::new(kind, ctx)?;
    let validation = Some((&data.x.dev, &data.y.dev));
    let history = model.train_model(&data.x.train, &data.y.train, validation, options, |_| {})?;

    let dev = model.evaluate(&data.x.dev, &data.y.dev, options.batch_size)?;
    let test = model.evaluate(&data.x.test, &data.y.test, options.batch_size)?;
    let test_kw = denormalized_metrics(&model, ctx, data)?;

    info!(
        model = %kind,
        dev_loss = dev.loss,
        dev_smape = dev.smape,
        test_loss = test.loss,
        test_smape = test.smape,
        test_mae_kw = test_kw.as_ref().map(|m| m.mae),
        "model evaluated"
    );

    Ok(ModelReport {
        model: kind,
        parameters: model.parameter_count(),
        history,
        dev,
        test,
        test_kw,
    })
}

fn denormalized_metrics(
    model: &Model,
    ctx: &ModelContext,
    data: &TransformedData,
) -> Result<Option<ForecastMetrics>> {
    if data.x.test.is_empty() {
        return Ok(None);
    }
    let prediction = model.predict(&data.x.test)?;
    let to_kw = |y: &Array3<f64>| -> Vec<f64> {
        ctx.normalization.denormalize_y(y).iter().copied().collect()
    };

    match ForecastMetrics::calculate(&to_kw(&data.y.test), &to_kw(&prediction)) {
        Ok(metrics) => Ok(Some(metrics)),
        Err(e) => {
            warn!(error = %e, "skipping denormalized test metrics");
            Ok(None)
        }
    }
}

fn write_summary(cfg: &Config, summary: &RunSummary) -> Result<PathBuf> {
    let dir = &cfg.training.weights_dir;
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("run_summary_{}.json", summary.run_id));
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
