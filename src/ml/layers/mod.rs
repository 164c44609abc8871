//! Building blocks of the trainable networks
//!
//! Layers keep no state between calls: `forward` takes `&self` and returns
//! the output together with a cache, and the matching `backward` consumes
//! that cache, accumulates into [`Param::grad`] and returns the gradient with
//! respect to its input.

use ndarray::{Array2, Array3, Zip};
use rand::distributions::Uniform;
use rand::Rng;

pub mod attention;
pub mod head;
pub mod linear;
pub mod lstm;
pub mod norm;

pub use attention::*;
pub use head::*;
pub use linear::*;
pub use lstm::*;
pub use norm::*;

/// Trainable matrix and its accumulated gradient
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Array2<f64>,
    pub grad: Array2<f64>,
}

impl Param {
    pub fn new(value: Array2<f64>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Self { value, grad }
    }

    /// Uniform initialization in `[-bound, bound]`
    pub fn uniform<R: Rng>(rows: usize, cols: usize, bound: f64, rng: &mut R) -> Self {
        let dist = Uniform::new_inclusive(-bound, bound);
        Self::new(Array2::from_shape_fn((rows, cols), |_| rng.sample(dist)))
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}

/// `(batch, steps, features)` -> `(batch * steps, features)`
pub(crate) fn to_rows(x: &Array3<f64>) -> Array2<f64> {
    let (batch, steps, features) = x.dim();
    Array2::from_shape_fn((batch * steps, features), |(r, c)| {
        x[[r / steps, r % steps, c]]
    })
}

/// Inverse of [`to_rows`]
pub(crate) fn from_rows(rows: &Array2<f64>, batch: usize, steps: usize) -> Array3<f64> {
    Array3::from_shape_fn((batch, steps, rows.ncols()), |(b, t, c)| {
        rows[[b * steps + t, c]]
    })
}

pub(crate) fn relu(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.max(0.0))
}

pub(crate) fn relu_backward(pre_activation: &Array2<f64>, grad: &Array2<f64>) -> Array2<f64> {
    Zip::from(pre_activation)
        .and(grad)
        .map_collect(|p, g| if *p > 0.0 { *g } else { 0.0 })
}

pub(crate) fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rows_round_trip() {
        let x = gradcheck::random((2, 3, 4), 1);
        let rows = to_rows(&x);
        assert_eq!(rows.dim(), (6, 4));
        assert_eq!(rows[[4, 1]], x[[1, 1, 1]]);
        assert_eq!(from_rows(&rows, 2, 3), x);
    }

    #[test]
    fn test_relu_backward_masks_negative_inputs() {
        let pre = array![[-1.0, 2.0], [0.0, 3.0]];
        let grad = array![[5.0, 5.0], [5.0, 5.0]];
        assert_eq!(relu(&pre), array![[0.0, 2.0], [0.0, 3.0]]);
        assert_eq!(relu_backward(&pre, &grad), array![[0.0, 5.0], [0.0, 5.0]]);
    }

    #[test]
    fn test_param_initialization_bounds() {
        let mut rng = gradcheck::rng(9);
        let param = Param::uniform(8, 5, 0.25, &mut rng);
        assert_eq!(param.len(), 40);
        assert!(param.value.iter().all(|v| v.abs() <= 0.25));
        assert!(param.grad.iter().all(|g| *g == 0.0));
    }
}
