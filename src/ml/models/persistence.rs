use ndarray::{s, Array3, Axis};

use crate::error::{ForecastError, Result};
use crate::forecast::NormalizationState;

/// Forecasts the last observable values of the lagged power column.
///
/// Inputs are denormalized to recover raw kW, the trailing `timesteps_out`
/// rows of the lagged column are taken as the forecast, and the result is
/// scaled back with the target scale.
#[derive(Debug, Clone)]
pub struct PersistenceModel {
    lagged_power_column: usize,
    timesteps_out: usize,
    normalization: NormalizationState,
}

impl PersistenceModel {
    pub fn new(
        lagged_power_column: Option<usize>,
        timesteps_out: usize,
        normalization: NormalizationState,
    ) -> Result<Self> {
        let lagged_power_column = lagged_power_column.ok_or(ForecastError::LaggedPowerRequired)?;
        if lagged_power_column >= normalization.nr_of_features() {
            return Err(ForecastError::FeatureCountMismatch {
                expected: lagged_power_column + 1,
                actual: normalization.nr_of_features(),
            });
        }
        Ok(Self {
            lagged_power_column,
            timesteps_out,
            normalization,
        })
    }

    pub fn nr_of_features(&self) -> usize {
        self.normalization.nr_of_features()
    }

    pub fn predict(&self, x: &Array3<f64>) -> Result<Array3<f64>> {
        let steps = x.len_of(Axis(1));
        if steps < self.timesteps_out {
            return Err(ForecastError::ShapeMismatch {
                context: "persistence input window",
                expected: vec![self.timesteps_out],
                actual: vec![steps],
            });
        }

        let raw = self.normalization.denormalize_x(x)?;
        let forecast = raw
            .slice(s![.., steps - self.timesteps_out.., self.lagged_power_column..self.lagged_power_column + 1])
            .to_owned();
        Ok(self.normalization.normalize_y(&forecast))
    }
}
