//! Forecast Metrics and Evaluation
//!
//! Error measures used by the training harness (on normalized tensors) and by
//! the experiment summary (on denormalized kW values).

use ndarray::{ArrayBase, Data, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Added to the SMAPE denominator so that two zero values score 0
pub const SMAPE_EPSILON: f64 = 1e-8;

/// Symmetric mean absolute percentage error in percent, bounded by [0, 200].
///
/// Returns 0.0 for empty inputs.
pub fn smape<S1, S2, D>(actual: &ArrayBase<S1, D>, predicted: &ArrayBase<S2, D>) -> f64
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if actual.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    Zip::from(actual).and(predicted).for_each(|a, p| {
        total += (p - a).abs() / (a.abs() + p.abs() + SMAPE_EPSILON);
    });
    total / actual.len() as f64 * 2.0 * 100.0
}

/// Mean squared error; 0.0 for empty inputs
pub fn mse<S1, S2, D>(actual: &ArrayBase<S1, D>, predicted: &ArrayBase<S2, D>) -> f64
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if actual.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    Zip::from(actual).and(predicted).for_each(|a, p| {
        total += (p - a).powi(2);
    });
    total / actual.len() as f64
}

/// Forecast accuracy metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Symmetric Mean Absolute Percentage Error (%)
    pub smape: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Number of samples evaluated
    pub sample_count: usize,
    /// Maximum error observed
    pub max_error: f64,
}

impl ForecastMetrics {
    /// Calculate metrics from actual and predicted values
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        if actual.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let residual_variance: f64 = errors.iter().map(|e| e * e).sum();
        let rmse = (residual_variance / n).sqrt();

        let smape = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (p - a).abs() / (a.abs() + p.abs() + SMAPE_EPSILON))
            .sum::<f64>()
            / n
            * 200.0;

        let mean_actual = actual.iter().sum::<f64>() / n;
        let total_variance: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let r2 = if total_variance > 1e-10 {
            1.0 - (residual_variance / total_variance)
        } else {
            0.0
        };

        let max_error = errors.iter().map(|e| e.abs()).fold(0.0f64, f64::max);

        Ok(ForecastMetrics {
            mae,
            rmse,
            smape,
            r2,
            sample_count: actual.len(),
            max_error,
        })
    }

    /// Assess forecast quality based on SMAPE
    pub fn quality(&self) -> ForecastQuality {
        if self.smape < 5.0 {
            ForecastQuality::Excellent
        } else if self.smape < 10.0 {
            ForecastQuality::Good
        } else if self.smape < 20.0 {
            ForecastQuality::Fair
        } else if self.smape < 50.0 {
            ForecastQuality::Poor
        } else {
            ForecastQuality::VeryPoor
        }
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics: MAE={:.3}, RMSE={:.3}, SMAPE={:.2}%, R²={:.3}, Quality={:?}",
            self.mae,
            self.rmse,
            self.smape,
            self.r2,
            self.quality()
        )
    }
}

/// Forecast quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastQuality {
    Excellent,  // SMAPE < 5%
    Good,       // SMAPE 5-10%
    Fair,       // SMAPE 10-20%
    Poor,       // SMAPE 20-50%
    VeryPoor,   // SMAPE > 50%
}

/// Forecast metrics calculation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}
