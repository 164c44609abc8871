use ndarray::{Array1, Array2, Axis};

use super::Param;

const LAYER_NORM_EPSILON: f64 = 1e-5;

/// Layer normalization over the last dimension of row-major activations
#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub gamma: Param,
    pub beta: Param,
}

#[derive(Debug, Clone)]
pub struct LayerNormCache {
    normalized: Array2<f64>,
    inv_std: Array1<f64>,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Param::new(Array2::ones((1, dim))),
            beta: Param::new(Array2::zeros((1, dim))),
        }
    }

    pub fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, LayerNormCache) {
        let dim = x.ncols() as f64;
        let mean = x.sum_axis(Axis(1)) / dim;
        let centered = x - &mean.insert_axis(Axis(1));
        let variance = centered.mapv(|v| v * v).sum_axis(Axis(1)) / dim;
        let inv_std = variance.mapv(|v| 1.0 / (v + LAYER_NORM_EPSILON).sqrt());
        let normalized = &centered * &inv_std.view().insert_axis(Axis(1));
        let output = &normalized * &self.gamma.value + &self.beta.value;
        (
            output,
            LayerNormCache {
                normalized,
                inv_std,
            },
        )
    }

    pub fn backward(&mut self, cache: &LayerNormCache, grad_output: &Array2<f64>) -> Array2<f64> {
        self.gamma.grad += &(grad_output * &cache.normalized)
            .sum_axis(Axis(0))
            .insert_axis(Axis(0));
        self.beta.grad += &grad_output.sum_axis(Axis(0)).insert_axis(Axis(0));

        let d_normalized = grad_output * &self.gamma.value;
        let dim = d_normalized.ncols() as f64;
        let sum_d = d_normalized.sum_axis(Axis(1)).insert_axis(Axis(1));
        let sum_d_xhat = (&d_normalized * &cache.normalized)
            .sum_axis(Axis(1))
            .insert_axis(Axis(1));

        let inner = &d_normalized * dim - &sum_d - &(&cache.normalized * &sum_d_xhat);
        inner * &(cache.inv_std.view().insert_axis(Axis(1)).mapv(|s| s / dim))
    }

    pub fn params(&self) -> Vec<&Param> {
        vec![&self.gamma, &self.beta]
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.gamma, &mut self.beta]
    }
}
