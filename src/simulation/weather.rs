//! # Weather Simulation
//!
//! Hourly-ish weather observations for a fixed location: seasonal and
//! diurnal temperature, persistent cloud cover, clear-sky irradiance
//! attenuated by clouds, wind, humidity and precipitation.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};

/// Column names of the generated weather series
pub const WEATHER_COLUMNS: [&str; 6] = [
    "temperature_c",
    "cloud_cover",
    "irradiance_w_m2",
    "wind_speed_m_s",
    "relative_humidity",
    "precipitation_mm",
];

/// Cloud cover level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudCover {
    Clear,
    PartlyCloudy,
    MostlyCloudy,
    Overcast,
}

impl CloudCover {
    /// Radiation transmission factor (0.0 = blocked, 1.0 = full)
    pub fn transmission_factor(&self) -> f64 {
        match self {
            CloudCover::Clear => 1.0,
            CloudCover::PartlyCloudy => 0.7,
            CloudCover::MostlyCloudy => 0.4,
            CloudCover::Overcast => 0.15,
        }
    }

    /// Covered fraction of the sky
    pub fn fraction(&self) -> f64 {
        match self {
            CloudCover::Clear => 0.05,
            CloudCover::PartlyCloudy => 0.3,
            CloudCover::MostlyCloudy => 0.7,
            CloudCover::Overcast => 0.95,
        }
    }

    /// Weighted towards clear/partly cloudy
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..100) {
            0..=40 => CloudCover::Clear,
            41..=70 => CloudCover::PartlyCloudy,
            71..=85 => CloudCover::MostlyCloudy,
            _ => CloudCover::Overcast,
        }
    }
}

/// Clear-sky radiation at a fixed location
#[derive(Debug, Clone, Copy)]
pub struct ClearSkyModel {
    latitude_deg: f64,
    longitude_deg: f64,
    /// Hours from UTC
    timezone_offset: i32,
}

impl Default for ClearSkyModel {
    /// Stockholm
    fn default() -> Self {
        Self::new(59.3293, 18.0686, 1)
    }
}

impl ClearSkyModel {
    pub fn new(latitude_deg: f64, longitude_deg: f64, timezone_offset: i32) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            timezone_offset,
        }
    }

    /// Solar elevation above the horizon in degrees
    pub fn solar_elevation(&self, time: NaiveDateTime) -> f64 {
        let day_of_year = time.ordinal() as f64;
        let hour = time.hour() as f64 + time.minute() as f64 / 60.0;

        let declination = (23.45 * (360.0 / 365.0 * (day_of_year + 284.0)).to_radians().sin())
            .to_radians();
        let latitude = self.latitude_deg.to_radians();

        let solar_time = hour + self.longitude_deg / 15.0 - self.timezone_offset as f64;
        let hour_angle = (15.0 * (solar_time - 12.0)).to_radians();

        let elevation_sin = latitude.sin() * declination.sin()
            + latitude.cos() * declination.cos() * hour_angle.cos();
        elevation_sin.asin().to_degrees()
    }

    /// Clear-sky irradiance in W/m²
    pub fn irradiance(&self, time: NaiveDateTime) -> f64 {
        let elevation_deg = self.solar_elevation(time);
        if elevation_deg <= 0.0 {
            return 0.0;
        }
        let elevation = elevation_deg.to_radians();

        // relative air mass; flattened near the horizon
        let air_mass = if elevation_deg > 5.0 {
            1.0 / elevation.sin()
        } else {
            12.0 - elevation_deg / 5.0
        };
        let transmittance = 0.7_f64.powf(air_mass.powf(0.678));

        1367.0 * transmittance * elevation.sin()
    }
}

/// Stateful weather generator; cloud conditions persist for a few hours
#[derive(Debug, Clone)]
pub struct WeatherSimulator {
    sky: ClearSkyModel,
    cloud_cover: CloudCover,
    cloud_minutes_left: i64,
}

impl Default for WeatherSimulator {
    fn default() -> Self {
        Self::new(ClearSkyModel::default())
    }
}

impl WeatherSimulator {
    pub fn new(sky: ClearSkyModel) -> Self {
        Self {
            sky,
            cloud_cover: CloudCover::Clear,
            cloud_minutes_left: 0,
        }
    }

    /// Mean seasonal and diurnal temperature in °C, coldest in mid January
    /// and at 05:00
    pub fn expected_temperature(time: NaiveDateTime) -> f64 {
        let day = time.ordinal() as f64;
        let hour = time.hour() as f64 + time.minute() as f64 / 60.0;
        let seasonal = 7.0 - 11.0 * (2.0 * PI * (day - 15.0) / 365.0).cos();
        let diurnal = -3.0 * (2.0 * PI * (hour - 5.0) / 24.0).cos();
        seasonal + diurnal
    }

    /// One observation row, ordered as [`WEATHER_COLUMNS`]
    pub fn observe<R: Rng>(&mut self, time: NaiveDateTime, step_minutes: i64, rng: &mut R) -> [f64; 6] {
        self.cloud_minutes_left -= step_minutes;
        if self.cloud_minutes_left <= 0 {
            self.cloud_cover = CloudCover::random(rng);
            self.cloud_minutes_left = rng.gen_range(30..=180);
        }

        let clouds = self.cloud_cover.fraction();
        let irradiance = self.sky.irradiance(time) * self.cloud_cover.transmission_factor();

        let temperature = Self::expected_temperature(time) - 2.0 * clouds
            + gaussian(0.0, 1.0, rng);
        let wind = gaussian(4.0, 2.0, rng).abs();
        let humidity = (0.55 + 0.35 * clouds + gaussian(0.0, 0.05, rng)).clamp(0.0, 1.0);
        let precipitation = if clouds > 0.9 && rng.gen_bool(0.3) {
            Exp::new(1.0).map(|exp| exp.sample(rng)).unwrap_or(0.0)
        } else {
            0.0
        };

        [temperature, clouds, irradiance, wind, humidity, precipitation]
    }
}

fn gaussian<R: Rng>(mean: f64, std_dev: f64, rng: &mut R) -> f64 {
    Normal::new(mean, std_dev)
        .map(|normal| normal.sample(rng))
        .unwrap_or(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_no_irradiance_at_night() {
        let sky = ClearSkyModel::default();
        assert_eq!(sky.irradiance(at(6, 21, 0)), 0.0);
        assert!(sky.irradiance(at(6, 21, 12)) > 500.0);
    }

    #[test]
    fn test_winter_is_colder_than_summer() {
        assert!(
            WeatherSimulator::expected_temperature(at(1, 15, 12))
                < WeatherSimulator::expected_temperature(at(7, 15, 12))
        );
    }

    #[test]
    fn test_observations_stay_in_range() {
        let mut weather = WeatherSimulator::default();
        let mut rng = StdRng::seed_from_u64(5);
        for hour in 0..48 {
            let row = weather.observe(at(3, 1, 0) + chrono::Duration::hours(hour), 60, &mut rng);
            assert!((0.0..=1.0).contains(&row[1]));
            assert!(row[2] >= 0.0);
            assert!(row[3] >= 0.0);
            assert!((0.0..=1.0).contains(&row[4]));
            assert!(row[5] >= 0.0);
        }
    }
}
