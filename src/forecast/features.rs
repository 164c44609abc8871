//! Feature engineering for the forecasting models
//!
//! Every example is one `(timesteps_in, nr_of_features)` window with the
//! following fixed column layout:
//!
//! | columns        | content                                           |
//! |----------------|---------------------------------------------------|
//! | 0..7           | one-hot day of week (holidays count as Sunday)    |
//! | 7, 8           | sin/cos of the hour of day (period 24h)           |
//! | 9, 10          | sin/cos of the day of year (period 366 days)      |
//! | 11 (optional)  | lagged power, shifted by `horizon + delay`        |
//! | remaining N    | weather history, zero beyond the anchor           |

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{s, Array3, ArrayViewMut2};
use tracing::debug;

use super::window::WindowSpec;
use crate::domain::{HolidayCalendar, ResampledProfile, WeatherSeries};
use crate::error::{ForecastError, Result};

/// Calendar columns: 7 weekday + 2 hour-of-day + 2 day-of-year
pub const CALENDAR_FEATURES: usize = 11;

/// Weather placeholder width when no weather series is available
pub const DEFAULT_WEATHER_FEATURES: usize = 6;

const WEEKDAY_NAMES: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

/// Column layout of the feature windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLayout {
    pub lagged_power: bool,
    pub weather_features: usize,
}

impl FeatureLayout {
    pub fn new(lagged_power: bool, weather_features: usize) -> Self {
        Self {
            lagged_power,
            weather_features,
        }
    }

    /// Layout for an optional weather series; absent weather falls back to
    /// `placeholder_width` zero columns.
    pub fn for_weather(
        lagged_power: bool,
        weather: Option<&WeatherSeries>,
        placeholder_width: usize,
    ) -> Self {
        let weather_features = weather
            .map(WeatherSeries::nr_of_columns)
            .unwrap_or(placeholder_width);
        Self::new(lagged_power, weather_features)
    }

    pub fn nr_of_features(&self) -> usize {
        CALENDAR_FEATURES + usize::from(self.lagged_power) + self.weather_features
    }

    pub fn lagged_power_column(&self) -> Option<usize> {
        self.lagged_power.then_some(CALENDAR_FEATURES)
    }

    pub fn weather_offset(&self) -> usize {
        CALENDAR_FEATURES + usize::from(self.lagged_power)
    }

    pub fn feature_names(&self, weather: Option<&WeatherSeries>) -> Vec<String> {
        let mut names: Vec<String> = WEEKDAY_NAMES.iter().map(|d| d.to_string()).collect();
        names.extend(
            ["hour_sin", "hour_cos", "day_of_year_sin", "day_of_year_cos"]
                .iter()
                .map(|n| n.to_string()),
        );
        if self.lagged_power {
            names.push("lagged_power".to_string());
        }
        match weather {
            Some(series) => names.extend(series.columns().iter().cloned()),
            None => names.extend((0..self.weather_features).map(|i| format!("weather_{}", i))),
        }
        names
    }
}

/// Weekday index (0=Monday..6=Sunday), with holidays mapped to Sunday
pub fn day_of_week_index(timestamp: NaiveDateTime, holidays: &HolidayCalendar) -> usize {
    if holidays.is_holiday(timestamp) {
        6
    } else {
        timestamp.weekday().num_days_from_monday() as usize
    }
}

/// Cyclical encoding of the (whole) hour of day
pub fn hour_of_day_cyclical(timestamp: NaiveDateTime) -> (f64, f64) {
    let angle = 2.0 * PI * timestamp.hour() as f64 / 24.0;
    (angle.sin(), angle.cos())
}

/// Cyclical encoding of the day of year (1..=366)
pub fn day_of_year_cyclical(timestamp: NaiveDateTime) -> (f64, f64) {
    let angle = 2.0 * PI * timestamp.ordinal() as f64 / 366.0;
    (angle.sin(), angle.cos())
}

/// Builds the stacked `(examples, timesteps_in, features)` input tensor
pub struct FeatureBuilder<'a> {
    spec: &'a WindowSpec,
    holidays: &'a HolidayCalendar,
    layout: FeatureLayout,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(spec: &'a WindowSpec, holidays: &'a HolidayCalendar, layout: FeatureLayout) -> Self {
        Self {
            spec,
            holidays,
            layout,
        }
    }

    pub fn build(
        &self,
        anchors: &[NaiveDateTime],
        profile: &ResampledProfile,
        weather: Option<&WeatherSeries>,
    ) -> Result<Array3<f64>> {
        if let Some(series) = weather {
            if series.nr_of_columns() != self.layout.weather_features {
                return Err(ForecastError::FeatureCountMismatch {
                    expected: self.layout.weather_features,
                    actual: series.nr_of_columns(),
                });
            }
        }

        let mut x = Array3::zeros((
            anchors.len(),
            self.spec.timesteps_in(),
            self.layout.nr_of_features(),
        ));
        for (anchor, window) in anchors.iter().zip(x.outer_iter_mut()) {
            self.fill_window(*anchor, window, profile, weather)?;
        }

        debug!(
            examples = anchors.len(),
            timesteps = self.spec.timesteps_in(),
            features = self.layout.nr_of_features(),
            "built feature windows"
        );
        Ok(x)
    }

    fn fill_window(
        &self,
        anchor: NaiveDateTime,
        mut window: ArrayViewMut2<'_, f64>,
        profile: &ResampledProfile,
        weather: Option<&WeatherSeries>,
    ) -> Result<()> {
        let start = anchor - self.spec.history();
        let timesteps = self.spec.timesteps_in();

        for step in 0..timesteps {
            let ts = start + self.spec.sampling() * step as i32;
            let mut row = window.row_mut(step);

            row[day_of_week_index(ts, self.holidays)] = 1.0;
            let (hour_sin, hour_cos) = hour_of_day_cyclical(ts);
            row[7] = hour_sin;
            row[8] = hour_cos;
            let (doy_sin, doy_cos) = day_of_year_cyclical(ts);
            row[9] = doy_sin;
            row[10] = doy_cos;
        }

        if let Some(column) = self.layout.lagged_power_column() {
            let lag = self.spec.lag();
            let lagged = profile
                .window(start - lag, anchor + self.spec.horizon() - lag)
                .filter(|values| values.len() == timesteps)
                .ok_or_else(|| ForecastError::Misaligned(format!(
                    "lagged power window for anchor {} is outside the resampled profile",
                    anchor
                )))?;
            for (step, value) in lagged.iter().enumerate() {
                window[[step, column]] = *value;
            }
        }

        // Weather is only known up to the anchor; later rows stay zero.
        if let Some(series) = weather {
            let offset = self.layout.weather_offset();
            let width = self.layout.weather_features;
            let rows = series.rows_between(start, anchor);
            let available = rows.nrows().min(timesteps);
            window
                .slice_mut(s![..available, offset..offset + width])
                .assign(&rows.slice(s![..available, ..]));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PowerProfile;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array2;

    fn spec() -> WindowSpec {
        WindowSpec::new(
            Duration::hours(1),
            Duration::hours(24),
            Duration::hours(23),
            Duration::hours(24),
            Duration::hours(24),
        )
        .unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    /// Hourly ramp: the value equals the number of hours since the start
    fn ramp_profile(days: usize) -> ResampledProfile {
        let values: Vec<f64> = (0..days * 24).map(|h| h as f64).collect();
        PowerProfile::from_uniform(at(1, 0), Duration::hours(1), &values)
            .resample(Duration::hours(1))
            .unwrap()
    }

    #[test]
    fn test_layout_feature_count() {
        assert_eq!(FeatureLayout::new(true, 6).nr_of_features(), 18);
        assert_eq!(FeatureLayout::new(true, 0).nr_of_features(), 12);
        assert_eq!(FeatureLayout::new(false, 3).nr_of_features(), 14);
        assert_eq!(FeatureLayout::new(true, 0).lagged_power_column(), Some(11));
        assert_eq!(FeatureLayout::new(false, 0).lagged_power_column(), None);
        assert_eq!(FeatureLayout::new(true, 2).feature_names(None).len(), 14);
    }

    #[test]
    fn test_holiday_maps_to_sunday() {
        // 2024-01-03 is a Wednesday
        let holidays = HolidayCalendar::new([NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()]);
        assert_eq!(day_of_week_index(at(3, 12), &holidays), 6);
        assert_eq!(day_of_week_index(at(3, 12), &HolidayCalendar::default()), 2);
        assert_eq!(day_of_week_index(at(4, 12), &holidays), 3);
    }

    #[test]
    fn test_cyclical_encodings() {
        let (sin, cos) = hour_of_day_cyclical(at(1, 6));
        assert!((sin - 1.0).abs() < 1e-12);
        assert!(cos.abs() < 1e-12);

        let (sin, cos) = day_of_year_cyclical(at(1, 0));
        let angle = 2.0 * PI / 366.0;
        assert!((sin - angle.sin()).abs() < 1e-12);
        assert!((cos - angle.cos()).abs() < 1e-12);
    }

    #[test]
    fn test_window_layout_and_lag() {
        let spec = spec();
        let holidays = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&spec, &holidays, FeatureLayout::new(true, 0));
        let profile = ramp_profile(10);
        let anchor = at(4, 0);

        let x = builder.build(&[anchor], &profile, None).unwrap();
        assert_eq!(x.shape(), &[1, 48, 12]);

        // one weekday active per row
        for row in x.slice(s![0, .., ..7]).outer_iter() {
            assert_eq!(row.sum(), 1.0);
        }
        // first row is 2024-01-03 00:00 (Wednesday)
        assert_eq!(x[[0, 0, 2]], 1.0);

        // step t carries the power measured 47h earlier
        let anchor_hours = 72.0;
        for step in 0..48 {
            let window_ts_hours = anchor_hours - 24.0 + step as f64;
            assert_eq!(x[[0, step, 11]], window_ts_hours - 47.0);
        }
        // the forecast rows carry the last observable day
        assert_eq!(x[[0, 47, 11]], anchor_hours - 24.0);
    }

    #[test]
    fn test_weather_is_truncated_at_anchor() {
        let spec = spec();
        let holidays = HolidayCalendar::default();
        let timestamps: Vec<NaiveDateTime> = (0..10 * 24)
            .map(|h| at(1, 0) + Duration::hours(h))
            .collect();
        let rows = Array2::from_shape_fn((timestamps.len(), 2), |(r, c)| (r * 10 + c) as f64 + 1.0);
        let weather = WeatherSeries::new(
            timestamps,
            vec!["temperature_c".to_string(), "cloud_cover_percent".to_string()],
            rows,
        )
        .unwrap();
        let layout = FeatureLayout::for_weather(false, Some(&weather), DEFAULT_WEATHER_FEATURES);
        let builder = FeatureBuilder::new(&spec, &holidays, layout);

        let x = builder.build(&[at(4, 0)], &ramp_profile(10), Some(&weather)).unwrap();
        assert_eq!(x.shape(), &[1, 48, 13]);

        // rows from anchor - 24h (hour 48) through the anchor (hour 72)
        assert_eq!(x[[0, 0, 11]], 481.0);
        assert_eq!(x[[0, 24, 12]], 722.0);
        for step in 25..48 {
            assert_eq!(x[[0, step, 11]], 0.0);
            assert_eq!(x[[0, step, 12]], 0.0);
        }
    }

    #[test]
    fn test_missing_weather_is_zero_filled() {
        let spec = spec();
        let holidays = HolidayCalendar::default();
        let builder = FeatureBuilder::new(
            &spec,
            &holidays,
            FeatureLayout::for_weather(true, None, DEFAULT_WEATHER_FEATURES),
        );

        let x = builder.build(&[at(4, 0), at(5, 0)], &ramp_profile(10), None).unwrap();
        assert_eq!(x.shape(), &[2, 48, 18]);
        assert!(x.slice(s![.., .., 12..]).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_weather_width_must_match_layout() {
        let spec = spec();
        let holidays = HolidayCalendar::default();
        let weather = WeatherSeries::new(
            vec![at(1, 0)],
            vec!["temperature_c".to_string()],
            Array2::zeros((1, 1)),
        )
        .unwrap();
        let builder = FeatureBuilder::new(&spec, &holidays, FeatureLayout::new(true, 6));

        let result = builder.build(&[at(4, 0)], &ramp_profile(10), Some(&weather));
        assert!(matches!(result, Err(ForecastError::FeatureCountMismatch { .. })));
    }

    #[test]
    fn test_no_anchors_builds_empty_tensor() {
        let spec = spec();
        let holidays = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&spec, &holidays, FeatureLayout::new(true, 6));

        let x = builder.build(&[], &ramp_profile(2), None).unwrap();
        assert_eq!(x.shape(), &[0, 48, 18]);
    }
}
