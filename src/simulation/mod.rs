//! # Synthetic Data Module
//!
//! Community-level demand and weather series used by the binary and the
//! integration tests when no measured data is supplied.
//!
//! ## Components
//!
//! - **House**: household load with time-of-day peaks, weekend shift, appliance runs and noise
//! - **Weather**: seasonal temperature, cloud cover, clear-sky irradiance and friends
//!
//! ## Usage
//!
//! ```rust
//! use load_forecast::config::SimulationConfig;
//! use load_forecast::simulation::synthetic_load_profile;
//!
//! let cfg = SimulationConfig { days: 3, households: 4, ..Default::default() };
//! let profile = synthetic_load_profile(&cfg);
//! assert_eq!(profile.len(), 3 * 48);
//! ```

use chrono::{Duration, NaiveDateTime, NaiveTime};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::SimulationConfig;
use crate::domain::{PowerProfile, WeatherSeries};
use crate::error::Result;

pub mod house;
pub mod weather;

pub use house::{Household, HouseholdConfig, LoadProfile};
pub use weather::{ClearSkyModel, CloudCover, WeatherSimulator, WEATHER_COLUMNS};

fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

fn start_of(cfg: &SimulationConfig) -> NaiveDateTime {
    cfg.start_date.and_time(NaiveTime::MIN)
}

fn steps_of(cfg: &SimulationConfig, step_minutes: i64) -> usize {
    (cfg.days as i64 * 24 * 60 / step_minutes.max(1)) as usize
}

/// Aggregate load (kW) of `cfg.households` households at the native resolution
pub fn synthetic_load_profile(cfg: &SimulationConfig) -> PowerProfile {
    let step_minutes = cfg.native_resolution_minutes.max(1);
    let interval = Duration::minutes(step_minutes);
    let start = start_of(cfg);
    let mut rng = rng_for(cfg.seed, 0);

    let mut households: Vec<Household> = (0..cfg.households)
        .map(|i| {
            Household::new(HouseholdConfig {
                profile: LoadProfile::for_household(i),
                household_size: 1 + (i % 5) as u32,
                ..HouseholdConfig::default()
            })
        })
        .collect();

    let values: Vec<f64> = (0..steps_of(cfg, step_minutes))
        .map(|step| {
            let time = start + interval * step as i32;
            households
                .iter_mut()
                .map(|house| house.sample(time, step_minutes, &mut rng))
                .sum()
        })
        .collect();

    info!(
        households = cfg.households,
        days = cfg.days,
        samples = values.len(),
        resolution_minutes = step_minutes,
        "generated synthetic load profile"
    );
    PowerProfile::from_uniform(start, interval, &values)
}

/// Weather observations every `interval` over the simulated period
pub fn synthetic_weather(cfg: &SimulationConfig, interval: Duration) -> Result<WeatherSeries> {
    let step_minutes = interval.num_minutes().max(1);
    let interval = Duration::minutes(step_minutes);
    let start = start_of(cfg);
    let steps = steps_of(cfg, step_minutes);
    let mut rng = rng_for(cfg.seed, 1);
    let mut simulator = WeatherSimulator::default();

    let mut rows = Array2::zeros((steps, WEATHER_COLUMNS.len()));
    let mut timestamps = Vec::with_capacity(steps);
    for (step, mut row) in rows.outer_iter_mut().enumerate() {
        let time = start + interval * step as i32;
        let observation = simulator.observe(time, step_minutes, &mut rng);
        row.iter_mut()
            .zip(observation)
            .for_each(|(cell, value)| *cell = value);
        timestamps.push(time);
    }

    info!(rows = steps, columns = WEATHER_COLUMNS.len(), "generated synthetic weather");
    WeatherSeries::new(
        timestamps,
        WEATHER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> SimulationConfig {
        SimulationConfig {
            days: 2,
            households: 5,
            native_resolution_minutes: 15,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            with_weather: true,
            seed: Some(42),
        }
    }

    #[test]
    fn test_load_profile_covers_whole_days() {
        let profile = synthetic_load_profile(&config());
        assert_eq!(profile.len(), 2 * 96);
        assert_eq!(profile.samples()[0].0, config().start_date.and_time(NaiveTime::MIN));
        assert!(profile.samples().iter().all(|(_, v)| *v >= 0.0));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = synthetic_load_profile(&config());
        let b = synthetic_load_profile(&config());
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn test_evening_exceeds_night_on_average() {
        let profile = synthetic_load_profile(&SimulationConfig {
            days: 14,
            ..config()
        });
        let mean_at = |hour: u32| {
            let values: Vec<f64> = profile
                .samples()
                .iter()
                .filter(|(ts, _)| chrono::Timelike::hour(ts) == hour)
                .map(|(_, v)| *v)
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        };
        assert!(mean_at(19) > mean_at(3));
    }

    #[test]
    fn test_weather_shape() {
        let weather = synthetic_weather(&config(), Duration::hours(1)).unwrap();
        assert_eq!(weather.len(), 48);
        assert_eq!(weather.nr_of_columns(), WEATHER_COLUMNS.len());
    }
}
