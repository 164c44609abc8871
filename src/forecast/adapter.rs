//! Raw series -> normalized, partitioned example tensors

use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDateTime};
use ndarray::Array3;
use tracing::{info, warn};

use super::features::{FeatureBuilder, FeatureLayout};
use super::normalize::NormalizationState;
use super::split::{DatasetPartition, DatasetSplit, IndexLocation, ShuffleMapping, SplitSizes};
use super::targets::build_targets;
use super::window::WindowSpec;
use crate::config::DataConfig;
use crate::domain::{HolidayCalendar, PowerProfile, WeatherSeries};
use crate::error::{ForecastError, Result};

/// One tensor per split, all sharing the trailing shape
#[derive(Debug, Clone)]
pub struct SplitTensors {
    pub train: Array3<f64>,
    pub dev: Array3<f64>,
    pub test: Array3<f64>,
    pub all: Array3<f64>,
}

impl SplitTensors {
    fn partitioned(data: &Array3<f64>, partition: &DatasetPartition) -> Self {
        Self {
            train: partition.select(data, DatasetSplit::Train),
            dev: partition.select(data, DatasetSplit::Dev),
            test: partition.select(data, DatasetSplit::Test),
            all: data.clone(),
        }
    }

    pub fn get(&self, split: DatasetSplit) -> &Array3<f64> {
        match split {
            DatasetSplit::Train => &self.train,
            DatasetSplit::Dev => &self.dev,
            DatasetSplit::Test => &self.test,
            DatasetSplit::All => &self.all,
        }
    }
}

/// Output of [`ModelAdapter::transform_data`]
#[derive(Debug, Clone)]
pub struct TransformedData {
    pub x: SplitTensors,
    pub y: SplitTensors,
    /// `None` when the series is too short to yield a single example
    pub normalization: Option<NormalizationState>,
    pub partition: DatasetPartition,
    pub first_anchor: NaiveDateTime,
    pub last_available: NaiveDateTime,
    pub spec: WindowSpec,
    pub layout: FeatureLayout,
}

impl TransformedData {
    pub fn nr_of_examples(&self) -> usize {
        self.partition.total()
    }

    pub fn nr_of_features(&self) -> usize {
        self.layout.nr_of_features()
    }

    pub fn timesteps_in(&self) -> usize {
        self.spec.timesteps_in()
    }

    pub fn timesteps_out(&self) -> usize {
        self.spec.timesteps_out()
    }

    /// Fitted normalization, or [`ForecastError::EmptyTrainingSplit`] for an empty dataset
    pub fn fitted_normalization(&self) -> Result<&NormalizationState> {
        self.normalization
            .as_ref()
            .ok_or(ForecastError::EmptyTrainingSplit)
    }

    pub fn unshuffled_index(&self, split: DatasetSplit, index: usize) -> Result<usize> {
        self.partition.unshuffled_index(split, index)
    }

    pub fn location_of(&self, index: usize) -> IndexLocation {
        self.partition.location_of(index)
    }

    /// Anchor timestamp of the `index`-th example of `split`
    pub fn start_date_of(&self, split: DatasetSplit, index: usize) -> Result<NaiveDateTime> {
        let chronological = self.unshuffled_index(split, index)?;
        Ok(self.first_anchor + self.spec.rate() * chronological as i32)
    }
}

/// Turns a power profile (and optional weather) into model-ready tensors
pub struct ModelAdapter {
    spec: WindowSpec,
    config: DataConfig,
    holidays: HolidayCalendar,
}

impl ModelAdapter {
    pub fn new(config: &DataConfig) -> Result<Self> {
        Ok(Self {
            spec: config.window_spec()?,
            config: config.clone(),
            holidays: HolidayCalendar::new(config.holidays.iter().copied()),
        })
    }

    pub fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Configured holidays, plus the Swedish fixed dates of `years` when enabled
    pub fn holidays_for(&self, years: RangeInclusive<i32>) -> HolidayCalendar {
        if self.config.swedish_holidays {
            HolidayCalendar::swedish_fixed(years).union(&self.holidays)
        } else {
            self.holidays.clone()
        }
    }

    pub fn layout(&self, weather: Option<&WeatherSeries>) -> FeatureLayout {
        FeatureLayout::for_weather(
            self.config.add_lagged_power,
            weather,
            self.config.weather_features,
        )
    }

    pub fn transform_data(
        &self,
        profile: &PowerProfile,
        weather: Option<&WeatherSeries>,
    ) -> Result<TransformedData> {
        let resampled = profile.resample(self.spec.sampling())?;
        let first_anchor = self.spec.first_anchor(
            resampled.first_timestamp(),
            self.config.first_prediction_clock_time,
        );
        if !resampled.is_on_grid(first_anchor) {
            return Err(ForecastError::Misaligned(format!(
                "first prediction clock time {} is not on the {} minute sampling grid",
                self.config.first_prediction_clock_time,
                self.spec.sampling().num_minutes()
            )));
        }

        let last_available = resampled.last_timestamp();
        let anchors = self.spec.anchors(first_anchor, last_available);
        info!(
            examples = anchors.len(),
            first_anchor = %first_anchor,
            last_available = %last_available,
            "computed prediction anchors"
        );

        let layout = self.layout(weather);
        let years = resampled.first_timestamp().year()..=last_available.year();
        let holidays = self.holidays_for(years);
        info!(
            holidays = holidays.len(),
            features = ?layout.feature_names(weather),
            "built feature layout"
        );
        let x = FeatureBuilder::new(&self.spec, &holidays, layout).build(
            &anchors,
            &resampled,
            weather,
        )?;
        let y = build_targets(&anchors, &resampled, &self.spec)?;

        let partition = self.partition(anchors.len())?;
        info!(
            train = partition.len(DatasetSplit::Train),
            dev = partition.len(DatasetSplit::Dev),
            test = partition.len(DatasetSplit::Test),
            unused = partition.unused_len(),
            shuffled = self.config.shuffle_data,
            "partitioned examples"
        );

        let (x, y, normalization) = if anchors.is_empty() {
            warn!("series too short for a single example, returning empty tensors");
            (x, y, None)
        } else {
            let y_train = partition.select(&y, DatasetSplit::Train);
            let x_train = partition.select(&x, DatasetSplit::Train);
            let normalization = NormalizationState::fit(&x_train, &y_train)?;
            let x = normalization.normalize_x(&x)?;
            let y = normalization.normalize_y(&y);
            (x, y, Some(normalization))
        };

        Ok(TransformedData {
            x: SplitTensors::partitioned(&x, &partition),
            y: SplitTensors::partitioned(&y, &partition),
            normalization,
            partition,
            first_anchor,
            last_available,
            spec: self.spec,
            layout,
        })
    }

    fn partition(&self, total: usize) -> Result<DatasetPartition> {
        let mapping = if self.config.shuffle_data {
            ShuffleMapping::shuffled(total, self.config.seed)
        } else {
            ShuffleMapping::identity(total)
        };
        DatasetPartition::new(total, self.split_sizes(), mapping)
    }

    fn split_sizes(&self) -> SplitSizes {
        self.config.split_sizes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime};

    fn hourly_profile(days: usize) -> PowerProfile {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let values: Vec<f64> = (0..days * 24)
            .map(|h| 2.0 + (h % 24) as f64 / 4.0 + (h / 24) as f64 * 0.1)
            .collect();
        PowerProfile::from_uniform(start, Duration::hours(1), &values)
    }

    fn config() -> DataConfig {
        DataConfig {
            weather_features: 0,
            dev_size: 3,
            test_size: 4,
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_transform_shapes() {
        let adapter = ModelAdapter::new(&config()).unwrap();
        let data = adapter.transform_data(&hourly_profile(20), None).unwrap();

        assert_eq!(data.nr_of_examples(), 17);
        assert_eq!(data.x.all.shape(), &[17, 48, 12]);
        assert_eq!(data.y.all.shape(), &[17, 24, 1]);
        assert_eq!(data.x.train.shape(), &[10, 48, 12]);
        assert_eq!(data.x.dev.shape()[0], 3);
        assert_eq!(data.y.test.shape()[0], 4);
    }

    #[test]
    fn test_start_date_lookup() {
        let adapter = ModelAdapter::new(&config()).unwrap();
        let data = adapter.transform_data(&hourly_profile(20), None).unwrap();

        let day4 = NaiveDate::from_ymd_opt(2024, 1, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(data.first_anchor, day4);
        assert_eq!(data.start_date_of(DatasetSplit::All, 0).unwrap(), day4);
        assert_eq!(
            data.start_date_of(DatasetSplit::Test, 0).unwrap(),
            day4 + Duration::days(13)
        );
        assert!(data.start_date_of(DatasetSplit::Dev, 3).is_err());
    }

    #[test]
    fn test_short_profile_yields_empty_tensors() {
        let adapter = ModelAdapter::new(&config()).unwrap();
        let data = adapter.transform_data(&hourly_profile(2), None).unwrap();

        assert_eq!(data.nr_of_examples(), 0);
        assert_eq!(data.x.all.shape(), &[0, 48, 12]);
        assert_eq!(data.y.all.shape(), &[0, 24, 1]);
        for split in [DatasetSplit::Train, DatasetSplit::Dev, DatasetSplit::Test] {
            assert_eq!(data.x.get(split).shape(), &[0, 48, 12]);
            assert_eq!(data.y.get(split).shape(), &[0, 24, 1]);
        }
        assert!(data.normalization.is_none());
        assert!(matches!(
            data.fitted_normalization(),
            Err(ForecastError::EmptyTrainingSplit)
        ));
    }

    #[test]
    fn test_held_out_splits_larger_than_dataset_are_rejected() {
        let cfg = DataConfig {
            dev_size: 10,
            test_size: 10,
            ..config()
        };
        let adapter = ModelAdapter::new(&cfg).unwrap();
        assert!(matches!(
            adapter.transform_data(&hourly_profile(20), None),
            Err(ForecastError::InvalidSplit(_))
        ));
    }

    #[test]
    fn test_swedish_holidays_cover_series_years() {
        let cfg = DataConfig {
            swedish_holidays: true,
            holidays: vec![NaiveDate::from_ymd_opt(2024, 3, 29).unwrap()],
            ..config()
        };
        let calendar = ModelAdapter::new(&cfg).unwrap().holidays_for(2023..=2024);
        assert_eq!(calendar.len(), 17);
        assert!(calendar.contains(NaiveDate::from_ymd_opt(2023, 12, 25).unwrap()));

        let plain = ModelAdapter::new(&config()).unwrap().holidays_for(2023..=2024);
        assert!(plain.is_empty());
    }

    #[test]
    fn test_swedish_holidays_map_to_sunday() {
        let cfg = DataConfig {
            swedish_holidays: true,
            ..config()
        };
        let data = ModelAdapter::new(&cfg)
            .unwrap()
            .transform_data(&hourly_profile(20), None)
            .unwrap();
        let raw = data
            .fitted_normalization()
            .unwrap()
            .denormalize_x(&data.x.all)
            .unwrap();

        // example 2 anchors Jan 6 (a Saturday, Epiphany); its window starts Jan 5 00:00
        assert!((raw[[2, 24, 6]] - 1.0).abs() < 1e-9);
        assert!(raw[[2, 24, 5]].abs() < 1e-9);
        // Jan 5 is an ordinary Friday
        assert!((raw[[2, 0, 4]] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_off_grid_clock_time_is_rejected() {
        let cfg = DataConfig {
            first_prediction_clock_time: NaiveTime::from_hms_opt(0, 30, 0).unwrap(),
            ..config()
        };
        let adapter = ModelAdapter::new(&cfg).unwrap();
        assert!(matches!(
            adapter.transform_data(&hourly_profile(20), None),
            Err(ForecastError::Misaligned(_))
        ));
    }
}
