//! Raw and resampled time series consumed by the forecasting pipeline.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ForecastError, Result};

/// Aggregate demand measurements at their native resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerProfile {
    samples: Vec<(NaiveDateTime, f64)>,
}

impl PowerProfile {
    /// Create a profile from timestamped samples (sorted on construction)
    pub fn new(mut samples: Vec<(NaiveDateTime, f64)>) -> Self {
        samples.sort_by_key(|(ts, _)| *ts);
        Self { samples }
    }

    /// Create a profile from values spaced `interval` apart starting at `start`
    pub fn from_uniform(start: NaiveDateTime, interval: Duration, values: &[f64]) -> Self {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + interval * i as i32, *v))
            .collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(NaiveDateTime, f64)] {
        &self.samples
    }

    /// Average the samples into bins of width `interval`.
    ///
    /// Bins are aligned to midnight of the first sample's day. Empty bins
    /// between the first and last sample take the previous bin's value.
    pub fn resample(&self, interval: Duration) -> Result<ResampledProfile> {
        let step = interval.num_seconds();
        if step <= 0 {
            return Err(ForecastError::Misaligned(format!(
                "sampling interval must be positive, got {}s",
                step
            )));
        }
        let (first_ts, _) = *self.samples.first().ok_or(ForecastError::EmptyProfile)?;
        let (last_ts, _) = *self.samples.last().ok_or(ForecastError::EmptyProfile)?;

        let origin = first_ts.date().and_time(NaiveTime::MIN);
        let bin_of = |ts: NaiveDateTime| (ts - origin).num_seconds().div_euclid(step);
        let first_bin = bin_of(first_ts);
        let nr_of_bins = (bin_of(last_ts) - first_bin + 1) as usize;

        let mut sums = vec![0.0; nr_of_bins];
        let mut counts = vec![0usize; nr_of_bins];
        for (ts, value) in &self.samples {
            let idx = (bin_of(*ts) - first_bin) as usize;
            sums[idx] += value;
            counts[idx] += 1;
        }

        let mut values = Vec::with_capacity(nr_of_bins);
        let mut filled = 0usize;
        for (sum, count) in sums.iter().zip(counts.iter()) {
            if *count > 0 {
                values.push(sum / *count as f64);
            } else {
                // The first bin always holds at least one sample.
                let previous = values.last().copied().unwrap_or(0.0);
                values.push(previous);
                filled += 1;
            }
        }
        if filled > 0 {
            warn!(filled, interval_s = step, "forward-filled empty bins while resampling power profile");
        }

        Ok(ResampledProfile {
            start: origin + Duration::seconds(first_bin * step),
            interval,
            values,
        })
    }
}

/// Power profile on a uniform, gap-free grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledProfile {
    start: NaiveDateTime,
    interval: Duration,
    values: Vec<f64>,
}

impl ResampledProfile {
    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.start
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.start + self.interval * (self.values.len() as i32 - 1)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grid index of `ts`, if it lies exactly on the grid
    pub fn index_of(&self, ts: NaiveDateTime) -> Option<usize> {
        let offset = (ts - self.start).num_seconds();
        let step = self.interval.num_seconds();
        if offset < 0 || offset % step != 0 {
            return None;
        }
        let idx = (offset / step) as usize;
        (idx < self.values.len()).then_some(idx)
    }

    pub fn is_on_grid(&self, ts: NaiveDateTime) -> bool {
        (ts - self.start).num_seconds() % self.interval.num_seconds() == 0
    }

    /// Values in the closed range `[start, end]`
    pub fn window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<&[f64]> {
        let from = self.index_of(start)?;
        let to = self.index_of(end)?;
        (from <= to).then(|| &self.values[from..=to])
    }
}

/// Multi-column weather observations on the power profile's calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSeries {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    rows: Array2<f64>,
}

impl WeatherSeries {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        rows: Array2<f64>,
    ) -> Result<Self> {
        if rows.nrows() != timestamps.len() || rows.ncols() != columns.len() {
            return Err(ForecastError::ShapeMismatch {
                context: "weather series",
                expected: vec![timestamps.len(), columns.len()],
                actual: rows.shape().to_vec(),
            });
        }

        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);
        let timestamps = order.iter().map(|&i| timestamps[i]).collect();
        let rows = rows.select(Axis(0), &order);

        Ok(Self {
            timestamps,
            columns,
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn nr_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Rows whose timestamp lies in the closed range `[start, end]`, in time order
    pub fn rows_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> ArrayView2<'_, f64> {
        let from = self.timestamps.partition_point(|ts| *ts < start);
        let to = self.timestamps.partition_point(|ts| *ts <= end).max(from);
        self.rows.slice(ndarray::s![from..to, ..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_resample_averages_bins() {
        let profile = PowerProfile::new(vec![
            (ts(1, 0, 0), 1.0),
            (ts(1, 0, 30), 3.0),
            (ts(1, 1, 0), 5.0),
            (ts(1, 1, 30), 7.0),
        ]);
        let resampled = profile.resample(Duration::hours(1)).unwrap();

        assert_eq!(resampled.values(), &[2.0, 6.0]);
        assert_eq!(resampled.first_timestamp(), ts(1, 0, 0));
        assert_eq!(resampled.last_timestamp(), ts(1, 1, 0));
    }

    #[test]
    fn test_resample_aligns_to_midnight() {
        let profile = PowerProfile::new(vec![(ts(1, 2, 45), 4.0), (ts(1, 3, 10), 2.0)]);
        let resampled = profile.resample(Duration::hours(1)).unwrap();

        assert_eq!(resampled.first_timestamp(), ts(1, 2, 0));
        assert_eq!(resampled.values(), &[4.0, 2.0]);
    }

    #[test]
    fn test_resample_fills_gaps() {
        let profile = PowerProfile::new(vec![(ts(1, 0, 0), 1.0), (ts(1, 3, 0), 4.0)]);
        let resampled = profile.resample(Duration::hours(1)).unwrap();

        assert_eq!(resampled.values(), &[1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_resample_empty_profile_fails() {
        let profile = PowerProfile::new(Vec::new());
        assert!(matches!(
            profile.resample(Duration::hours(1)),
            Err(ForecastError::EmptyProfile)
        ));
    }

    #[test]
    fn test_window_is_inclusive() {
        let profile =
            PowerProfile::from_uniform(ts(1, 0, 0), Duration::hours(1), &[0.0, 1.0, 2.0, 3.0]);
        let resampled = profile.resample(Duration::hours(1)).unwrap();

        assert_eq!(resampled.window(ts(1, 1, 0), ts(1, 3, 0)), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(resampled.window(ts(1, 1, 0), ts(1, 4, 0)), None);
        assert_eq!(resampled.index_of(ts(1, 1, 30)), None);
    }

    #[test]
    fn test_weather_rows_between() {
        let weather = WeatherSeries::new(
            vec![ts(1, 2, 0), ts(1, 0, 0), ts(1, 1, 0)],
            vec!["temperature_c".to_string()],
            array![[12.0], [10.0], [11.0]],
        )
        .unwrap();

        let rows = weather.rows_between(ts(1, 1, 0), ts(1, 5, 0));
        assert_eq!(rows, array![[11.0], [12.0]]);
        assert_eq!(weather.rows_between(ts(2, 0, 0), ts(2, 5, 0)).nrows(), 0);
    }

    #[test]
    fn test_weather_shape_is_checked() {
        let result = WeatherSeries::new(
            vec![ts(1, 0, 0)],
            vec!["a".to_string(), "b".to_string()],
            array![[1.0]],
        );
        assert!(matches!(result, Err(ForecastError::ShapeMismatch { .. })));
    }
}
