use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveTime};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::forecast::{SplitSizes, WindowSpec};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub data: DataConfig,
    #[validate(nested)]
    pub training: TrainingConfig,
    #[validate(nested)]
    pub simulation: SimulationConfig,
}

/// Shape of the examples and the train/dev/test partition
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DataConfig {
    #[validate(range(min = 1))]
    pub sampling_minutes: i64,
    #[validate(range(min = 0))]
    pub prediction_history_hours: i64,
    #[validate(range(min = 0))]
    pub prediction_horizon_minutes: i64,
    #[validate(range(min = 1))]
    pub prediction_rate_minutes: i64,
    #[validate(range(min = 0))]
    pub measurement_delay_minutes: i64,
    pub first_prediction_clock_time: NaiveTime,
    /// `None` spans all history before the dev split
    pub train_size: Option<usize>,
    pub dev_size: usize,
    pub test_size: usize,
    pub add_lagged_power: bool,
    pub shuffle_data: bool,
    pub seed: Option<u64>,
    /// Placeholder width used when no weather series is supplied
    pub weather_features: usize,
    pub holidays: Vec<NaiveDate>,
    /// Add the Swedish fixed-date holidays for every year the series covers
    pub swedish_holidays: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sampling_minutes: 60,
            prediction_history_hours: 24,
            prediction_horizon_minutes: 23 * 60,
            prediction_rate_minutes: 24 * 60,
            measurement_delay_minutes: 24 * 60,
            first_prediction_clock_time: NaiveTime::MIN,
            train_size: None,
            dev_size: 0,
            test_size: 0,
            add_lagged_power: true,
            shuffle_data: false,
            seed: None,
            weather_features: crate::forecast::DEFAULT_WEATHER_FEATURES,
            holidays: Vec::new(),
            swedish_holidays: false,
        }
    }
}

impl DataConfig {
    pub fn window_spec(&self) -> crate::error::Result<WindowSpec> {
        WindowSpec::new(
            Duration::minutes(self.sampling_minutes),
            Duration::hours(self.prediction_history_hours),
            Duration::minutes(self.prediction_horizon_minutes),
            Duration::minutes(self.measurement_delay_minutes),
            Duration::minutes(self.prediction_rate_minutes),
        )
    }

    pub fn split_sizes(&self) -> SplitSizes {
        SplitSizes {
            train: self.train_size,
            dev: self.dev_size,
            test: self.test_size,
        }
    }
}

/// Optimization settings shared by all trainable model variants
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    #[validate(length(min = 1))]
    pub models: Vec<String>,
    #[validate(range(min = 1))]
    pub epochs: usize,
    #[validate(length(min = 1))]
    pub learning_rates: Vec<f64>,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    pub pretrain: bool,
    pub finetune: bool,
    pub weights_dir: PathBuf,
    pub seed: Option<u64>,
    pub validate_each_epoch: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "Knn".to_string(),
                "Persistence".to_string(),
                "RecurrentNet".to_string(),
                "TransformerNet".to_string(),
                "ExtendedMemoryNet".to_string(),
            ],
            epochs: 100,
            learning_rates: vec![0.01, 0.005, 0.001, 0.0005],
            batch_size: 256,
            pretrain: false,
            finetune: false,
            weights_dir: PathBuf::from("outputs"),
            seed: None,
            validate_each_epoch: true,
        }
    }
}

/// Synthetic community load used by the binary
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    #[validate(range(min = 1))]
    pub days: usize,
    #[validate(range(min = 1))]
    pub households: usize,
    #[validate(range(min = 1, max = 1440))]
    pub native_resolution_minutes: i64,
    pub start_date: NaiveDate,
    pub with_weather: bool,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 120,
            households: 37,
            native_resolution_minutes: 30,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            with_weather: true,
            seed: Some(7),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("LOAD_FORECAST__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.training.learning_rates, vec![0.01, 0.005, 0.001, 0.0005]);
        assert_eq!(cfg.data.weather_features, 6);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [data]
            test_size = 30
            dev_size = 10
            train_size = 90
            holidays = ["2024-12-25"]

            [training]
            models = ["KNN", "LSTM"]
            epochs = 5
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();

        assert_eq!(cfg.data.test_size, 30);
        assert_eq!(cfg.data.train_size, Some(90));
        assert_eq!(cfg.data.sampling_minutes, 60);
        assert_eq!(cfg.data.holidays.len(), 1);
        assert_eq!(cfg.training.epochs, 5);
        assert_eq!(cfg.training.batch_size, 256);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [training]
            epochs = 0
            learning_rates = []
            "#,
        ));
        assert!(Config::from_figment(figment).is_err());
    }

    #[test]
    fn test_window_spec_from_defaults() {
        let spec = DataConfig::default().window_spec().unwrap();
        assert_eq!(spec.timesteps_in(), 48);
        assert_eq!(spec.timesteps_out(), 24);
    }
}
