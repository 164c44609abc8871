//! Prediction anchors and window lengths

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::error::{ForecastError, Result};

/// Time geometry of one forecasting run.
///
/// Every example covers `[anchor - history, anchor + horizon]` as input and
/// `[anchor, anchor + horizon]` as target, both closed and sampled every
/// `sampling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    sampling: Duration,
    history: Duration,
    horizon: Duration,
    delay: Duration,
    rate: Duration,
}

impl WindowSpec {
    pub fn new(
        sampling: Duration,
        history: Duration,
        horizon: Duration,
        delay: Duration,
        rate: Duration,
    ) -> Result<Self> {
        let step = sampling.num_seconds();
        if step <= 0 {
            return Err(ForecastError::Misaligned(
                "sampling interval must be positive".to_string(),
            ));
        }
        if rate.num_seconds() <= 0 {
            return Err(ForecastError::Misaligned(
                "prediction rate must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("prediction history", history),
            ("prediction horizon", horizon),
            ("measurement delay", delay),
            ("prediction rate", rate),
        ] {
            let secs = value.num_seconds();
            if secs < 0 || secs % step != 0 {
                return Err(ForecastError::Misaligned(format!(
                    "{} of {}s is not a non-negative multiple of the {}s sampling interval",
                    name, secs, step
                )));
            }
        }

        Ok(Self {
            sampling,
            history,
            horizon,
            delay,
            rate,
        })
    }

    pub fn sampling(&self) -> Duration {
        self.sampling
    }

    pub fn history(&self) -> Duration {
        self.history
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    /// Input window length, identical for every example of a run
    pub fn timesteps_in(&self) -> usize {
        ((self.history + self.horizon).num_seconds() / self.sampling.num_seconds()) as usize + 1
    }

    /// Target window length, identical for every example of a run
    pub fn timesteps_out(&self) -> usize {
        (self.horizon.num_seconds() / self.sampling.num_seconds()) as usize + 1
    }

    /// Offset between a window step and the lagged power value it carries
    pub fn lag(&self) -> Duration {
        self.horizon + self.delay
    }

    /// Earliest anchor for a series starting at `series_start`, snapped forward
    /// to the next occurrence of `clock_time`.
    pub fn first_anchor(&self, series_start: NaiveDateTime, clock_time: NaiveTime) -> NaiveDateTime {
        let earliest = series_start + self.history + self.horizon + self.delay;
        let same_day = earliest.date().and_time(clock_time);
        if same_day < earliest {
            same_day + Duration::days(1)
        } else {
            same_day
        }
    }

    /// All anchors from `first` whose horizon ends no later than `last_available`
    pub fn anchors(&self, first: NaiveDateTime, last_available: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut anchors = Vec::new();
        let mut next = first;
        while next + self.horizon <= last_available {
            anchors.push(next);
            next += self.rate;
        }
        anchors
    }
}
