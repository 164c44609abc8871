//! # Household Load Simulation
//!
//! Electrical load of a single household: base load scaled by a
//! time-of-day multiplier with morning and evening peaks, a weekend shift,
//! occasional appliance runs and Gaussian noise.

use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Load profile type for different household patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadProfile {
    Conservative,
    Average,
    HighConsumption,
}

impl LoadProfile {
    /// Base load in kW
    pub fn base_load_kw(&self) -> f64 {
        match self {
            LoadProfile::Conservative => 0.3,
            LoadProfile::Average => 0.5,
            LoadProfile::HighConsumption => 0.8,
        }
    }

    pub fn peak_multiplier(&self) -> f64 {
        match self {
            LoadProfile::Conservative => 3.0,
            LoadProfile::Average => 4.0,
            LoadProfile::HighConsumption => 6.0,
        }
    }

    /// Profile of the `index`-th household of a community
    pub fn for_household(index: usize) -> Self {
        match index % 4 {
            0 | 2 => LoadProfile::Average,
            1 => LoadProfile::Conservative,
            _ => LoadProfile::HighConsumption,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdConfig {
    pub profile: LoadProfile,
    /// Number of people (scales appliance probability)
    pub household_size: u32,
    pub enable_appliance_events: bool,
    /// Noise standard deviation as fraction of base load
    pub noise_std_dev: f64,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            profile: LoadProfile::Average,
            household_size: 3,
            enable_appliance_events: true,
            noise_std_dev: 0.1,
        }
    }
}

/// Stateful load generator; appliance runs persist across samples
#[derive(Debug, Clone)]
pub struct Household {
    config: HouseholdConfig,
    /// (power kW, remaining minutes)
    active_appliances: Vec<(f64, i64)>,
}

impl Household {
    pub fn new(config: HouseholdConfig) -> Self {
        Self {
            config,
            active_appliances: Vec::new(),
        }
    }

    pub fn config(&self) -> &HouseholdConfig {
        &self.config
    }

    /// Time-of-day multiplier for typical household patterns
    pub fn tod_multiplier(&self, time: NaiveDateTime) -> f64 {
        let hour = time.hour() as f64 + time.minute() as f64 / 60.0;
        let is_weekend = time.weekday().num_days_from_monday() >= 5;

        let base = if hour < 6.0 {
            0.5
        } else if hour < 9.0 {
            2.5 + (hour - 6.0) * 0.5
        } else if hour < 16.0 {
            1.0
        } else if hour < 21.0 {
            3.5 + (hour - 16.0) * 0.3
        } else {
            4.0 - (hour - 21.0) * 0.5
        };

        // sleep in, then more active at home
        let multiplier = match (is_weekend, hour) {
            (true, h) if h < 9.0 => base * 0.7,
            (true, h) if h < 22.0 => base * 1.2,
            _ => base,
        };

        multiplier.min(self.config.profile.peak_multiplier())
    }

    /// Mean load in kW over the `step_minutes` interval starting at `time`
    pub fn sample<R: Rng>(&mut self, time: NaiveDateTime, step_minutes: i64, rng: &mut R) -> f64 {
        self.advance_appliances(time, step_minutes, rng);

        let base = self.config.profile.base_load_kw();
        let appliances: f64 = self.active_appliances.iter().map(|(power, _)| power).sum();
        let noise = Normal::new(0.0, base * self.config.noise_std_dev)
            .map(|normal| normal.sample(rng))
            .unwrap_or(0.0);

        (base * self.tod_multiplier(time) + appliances + noise).max(0.0)
    }

    fn advance_appliances<R: Rng>(&mut self, time: NaiveDateTime, step_minutes: i64, rng: &mut R) {
        self.active_appliances.retain_mut(|(_, remaining)| {
            *remaining -= step_minutes;
            *remaining > 0
        });
        if !self.config.enable_appliance_events || step_minutes <= 0 {
            return;
        }

        let per_minute = match time.hour() {
            7..=9 | 17..=21 => 0.005,
            10..=16 => 0.002,
            _ => 0.001,
        } * (self.config.household_size as f64 / 3.0);
        let probability = (per_minute * step_minutes as f64).min(1.0);

        if rng.gen_bool(probability) {
            let appliance = random_appliance(rng);
            self.active_appliances.push(appliance);
        }
    }
}

/// Random appliance power (kW) and run time (minutes)
fn random_appliance<R: Rng>(rng: &mut R) -> (f64, i64) {
    match rng.gen_range(0..10) {
        0..=2 => (2.5, 90),  // dishwasher
        3..=5 => (2.0, 120), // washing machine
        6..=7 => (3.0, 60),  // tumble dryer
        8 => (1.5, 30),      // vacuum cleaner
        _ => (0.8, 45),
    }
}
