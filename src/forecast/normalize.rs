//! Z-score normalization fitted on the training split

use ndarray::{Array1, Array3, ArrayBase, Axis, Data, Ix3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ForecastError, Result};

/// Floor for feature standard deviations, and the zero-variance threshold for targets
pub const STD_EPSILON: f64 = 1e-8;

/// Fitted normalization parameters of one run.
///
/// Only constructed by [`NormalizationState::fit`] (or restored from fitted
/// parts), so holding a value means the training split has been seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationState {
    x_mean: Array1<f64>,
    x_std: Array1<f64>,
    y_std: f64,
}

impl NormalizationState {
    /// Fit per-feature mean/std of X over examples and timesteps, and the
    /// scalar std of Y.
    pub fn fit<S1, S2>(x_train: &ArrayBase<S1, Ix3>, y_train: &ArrayBase<S2, Ix3>) -> Result<Self>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        if x_train.len_of(Axis(0)) == 0 || y_train.is_empty() {
            return Err(ForecastError::EmptyTrainingSplit);
        }

        let features = x_train.len_of(Axis(2));
        let flat = x_train
            .to_shape((x_train.len() / features.max(1), features))
            .map_err(|_| ForecastError::ShapeMismatch {
                context: "normalization fit",
                expected: vec![features],
                actual: x_train.shape().to_vec(),
            })?;
        let x_mean = flat.mean_axis(Axis(0)).ok_or(ForecastError::EmptyTrainingSplit)?;
        let mut x_std = flat.std_axis(Axis(0), 0.0);

        let clamped = x_std.iter().filter(|s| **s <= STD_EPSILON).count();
        if clamped > 0 {
            warn!(clamped, "zero-variance input features, clamping std to epsilon");
            x_std.mapv_inplace(|s| s.max(STD_EPSILON));
        }

        let y_std = y_train.std(0.0);
        if y_std <= STD_EPSILON {
            return Err(ForecastError::ZeroVarianceTarget);
        }

        info!(features, y_std, "fitted normalization on training split");
        Ok(Self {
            x_mean,
            x_std,
            y_std,
        })
    }

    /// Restore a state from previously fitted parameters
    pub fn from_parts(x_mean: Array1<f64>, x_std: Array1<f64>, y_std: f64) -> Result<Self> {
        if x_mean.len() != x_std.len() {
            return Err(ForecastError::FeatureCountMismatch {
                expected: x_mean.len(),
                actual: x_std.len(),
            });
        }
        if y_std <= STD_EPSILON {
            return Err(ForecastError::ZeroVarianceTarget);
        }
        Ok(Self {
            x_mean,
            x_std: x_std.mapv(|s| s.max(STD_EPSILON)),
            y_std,
        })
    }

    pub fn nr_of_features(&self) -> usize {
        self.x_mean.len()
    }

    pub fn x_mean(&self) -> &Array1<f64> {
        &self.x_mean
    }

    pub fn x_std(&self) -> &Array1<f64> {
        &self.x_std
    }

    pub fn y_std(&self) -> f64 {
        self.y_std
    }

    pub fn normalize_x<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix3>) -> Result<Array3<f64>> {
        self.check_features(x)?;
        Ok((x - &self.x_mean) / &self.x_std)
    }

    pub fn denormalize_x<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix3>) -> Result<Array3<f64>> {
        self.check_features(x)?;
        Ok(x * &self.x_std + &self.x_mean)
    }

    pub fn normalize_y<S: Data<Elem = f64>>(&self, y: &ArrayBase<S, Ix3>) -> Array3<f64> {
        y.mapv(|v| v / self.y_std)
    }

    pub fn denormalize_y<S: Data<Elem = f64>>(&self, y: &ArrayBase<S, Ix3>) -> Array3<f64> {
        y.mapv(|v| v * self.y_std)
    }

    fn check_features<S: Data<Elem = f64>>(&self, x: &ArrayBase<S, Ix3>) -> Result<()> {
        let actual = x.len_of(Axis(2));
        if actual != self.nr_of_features() {
            return Err(ForecastError::FeatureCountMismatch {
                expected: self.nr_of_features(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};
    use proptest::prelude::*;

    fn sample_x() -> Array3<f64> {
        array![
            [[1.0, 5.0, 0.0], [3.0, 5.0, 2.0]],
            [[5.0, 5.0, 4.0], [7.0, 5.0, 6.0]],
        ]
    }

    #[test]
    fn test_fit_statistics() {
        let y = array![[[1.0], [3.0]]];
        let state = NormalizationState::fit(&sample_x(), &y).unwrap();

        assert_eq!(state.x_mean(), &array![4.0, 5.0, 3.0]);
        assert!((state.x_std()[0] - 5.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(state.x_std()[1], STD_EPSILON);
        assert_eq!(state.y_std(), 1.0);
    }

    #[test]
    fn test_normalized_train_has_zero_mean() {
        let y = array![[[1.0], [3.0]]];
        let state = NormalizationState::fit(&sample_x(), &y).unwrap();
        let normalized = state.normalize_x(&sample_x()).unwrap();

        let mean = normalized.mean_axis(Axis(0)).unwrap().mean_axis(Axis(0)).unwrap();
        assert!(mean.iter().all(|m| m.abs() < 1e-12));
    }

    #[test]
    fn test_zero_variance_target_is_fatal() {
        let y = array![[[2.0], [2.0]], [[2.0], [2.0]]];
        assert!(matches!(
            NormalizationState::fit(&sample_x(), &y),
            Err(ForecastError::ZeroVarianceTarget)
        ));
    }

    #[test]
    fn test_empty_train_split_is_fatal() {
        let x = Array3::<f64>::zeros((0, 2, 3));
        let y = Array3::<f64>::zeros((0, 2, 1));
        assert!(matches!(
            NormalizationState::fit(&x, &y),
            Err(ForecastError::EmptyTrainingSplit)
        ));
    }

    #[test]
    fn test_feature_count_is_checked() {
        let y = array![[[1.0], [3.0]]];
        let state = NormalizationState::fit(&sample_x(), &y).unwrap();
        let wrong = Array3::<f64>::zeros((1, 2, 4));
        assert!(matches!(
            state.normalize_x(&wrong),
            Err(ForecastError::FeatureCountMismatch { expected: 3, actual: 4 })
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            values in prop::collection::vec(-1e3f64..1e3, 24),
            targets in prop::collection::vec(-50f64..50.0, 8),
        ) {
            prop_assume!(targets.iter().any(|t| (t - targets[0]).abs() > 1e-3));
            let x = Array::from_shape_vec((2, 4, 3), values).unwrap();
            let y = Array::from_shape_vec((2, 4, 1), targets).unwrap();
            let state = NormalizationState::fit(&x, &y).unwrap();

            let x_back = state.denormalize_x(&state.normalize_x(&x).unwrap()).unwrap();
            let y_back = state.denormalize_y(&state.normalize_y(&y));
            for (a, b) in x.iter().zip(x_back.iter()) {
                prop_assert!((a - b).abs() < 1e-6);
            }
            for (a, b) in y.iter().zip(y_back.iter()) {
                prop_assert!((a - b).abs() < 1e-9);
            }
        }
    }
}
