//! Staged learning-rate schedule
//!
//! For `n` rates the boundaries are `1 - i/n` (i = 0..n) in ascending order,
//! expressed as a fraction of the training run. An epoch uses the rate of the
//! first interval whose upper boundary exceeds `epoch / max_epochs`.

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct LearningRateSchedule {
    rates: Vec<f64>,
    boundaries: Vec<f64>,
}

impl LearningRateSchedule {
    pub fn new(rates: &[f64]) -> Result<Self> {
        if rates.is_empty() {
            return Err(ForecastError::InvalidSchedule(
                "at least one learning rate is required".to_string(),
            ));
        }
        if let Some(rate) = rates.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return Err(ForecastError::InvalidSchedule(format!(
                "learning rates must be positive, got {}",
                rate
            )));
        }

        let n = rates.len() as f64;
        let mut boundaries: Vec<f64> = (0..rates.len()).map(|i| 1.0 - i as f64 / n).collect();
        boundaries.reverse();
        Ok(Self {
            rates: rates.to_vec(),
            boundaries,
        })
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn initial_rate(&self) -> f64 {
        self.rates[0]
    }

    pub fn rate_at(&self, epoch: usize, max_epochs: usize) -> f64 {
        let progress = epoch as f64 / max_epochs.max(1) as f64;
        self.boundaries
            .iter()
            .position(|boundary| *boundary > progress)
            .map_or(self.rates[self.rates.len() - 1], |i| self.rates[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.01)]
    #[case(24, 0.01)]
    #[case(25, 0.005)]
    #[case(50, 0.001)]
    #[case(74, 0.001)]
    #[case(75, 0.0005)]
    #[case(99, 0.0005)]
    #[case(150, 0.0005)]
    fn test_staged_rates(#[case] epoch: usize, #[case] expected: f64) {
        let schedule = LearningRateSchedule::new(&[0.01, 0.005, 0.001, 0.0005]).unwrap();
        assert_eq!(schedule.rate_at(epoch, 100), expected);
    }

    #[test]
    fn test_boundaries_are_ascending() {
        let schedule = LearningRateSchedule::new(&[0.01, 0.005, 0.001, 0.0005]).unwrap();
        assert_eq!(schedule.boundaries(), &[0.25, 0.5, 0.75, 1.0]);
        assert_eq!(schedule.initial_rate(), 0.01);
    }

    #[test]
    fn test_single_rate_is_constant() {
        let schedule = LearningRateSchedule::new(&[0.003]).unwrap();
        assert_eq!(schedule.rate_at(0, 10), 0.003);
        assert_eq!(schedule.rate_at(9, 10), 0.003);
    }

    #[test]
    fn test_invalid_rates_are_rejected() {
        assert!(LearningRateSchedule::new(&[]).is_err());
        assert!(LearningRateSchedule::new(&[0.01, -0.1]).is_err());
    }
}
