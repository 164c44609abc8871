//! Target windows

use chrono::NaiveDateTime;
use ndarray::Array3;

use super::window::WindowSpec;
use crate::domain::ResampledProfile;
use crate::error::{ForecastError, Result};

/// Stack `[anchor, anchor + horizon]` of every anchor into `(examples, timesteps_out, 1)`
pub fn build_targets(
    anchors: &[NaiveDateTime],
    profile: &ResampledProfile,
    spec: &WindowSpec,
) -> Result<Array3<f64>> {
    let timesteps = spec.timesteps_out();
    let mut y = Array3::zeros((anchors.len(), timesteps, 1));

    for (example, anchor) in anchors.iter().enumerate() {
        let values = profile
            .window(*anchor, *anchor + spec.horizon())
            .filter(|values| values.len() == timesteps)
            .ok_or_else(|| {
                ForecastError::Misaligned(format!(
                    "target window for anchor {} is outside the resampled profile",
                    anchor
                ))
            })?;
        for (step, value) in values.iter().enumerate() {
            y[[example, step, 0]] = *value;
        }
    }

    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PowerProfile;
    use chrono::{Duration, NaiveDate};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_targets_cover_horizon() {
        let spec = WindowSpec::new(
            Duration::hours(1),
            Duration::hours(24),
            Duration::hours(23),
            Duration::hours(24),
            Duration::hours(24),
        )
        .unwrap();
        let values: Vec<f64> = (0..5 * 24).map(|h| h as f64).collect();
        let profile = PowerProfile::from_uniform(at(1, 0), Duration::hours(1), &values)
            .resample(Duration::hours(1))
            .unwrap();

        let y = build_targets(&[at(4, 0), at(5, 0)], &profile, &spec).unwrap();
        assert_eq!(y.shape(), &[2, 24, 1]);
        assert_eq!(y[[0, 0, 0]], 72.0);
        assert_eq!(y[[0, 23, 0]], 95.0);
        assert_eq!(y[[1, 23, 0]], 119.0);
    }

    #[test]
    fn test_target_past_profile_end_fails() {
        let spec = WindowSpec::new(
            Duration::hours(1),
            Duration::hours(0),
            Duration::hours(23),
            Duration::hours(0),
            Duration::hours(24),
        )
        .unwrap();
        let profile = PowerProfile::from_uniform(at(1, 0), Duration::hours(1), &[1.0; 10])
            .resample(Duration::hours(1))
            .unwrap();

        assert!(build_targets(&[at(1, 0)], &profile, &spec).is_err());
    }
}
