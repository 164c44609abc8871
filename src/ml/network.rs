use ndarray::Array3;

use super::layers::Param;

/// Forward/backward contract of the trainable model variants.
///
/// `forward` is the training-mode pass and keeps what `backward` needs;
/// `predict` is the inference-mode pass.
pub trait Network {
    type Cache;

    /// `(batch, timesteps_in, features)` -> `(batch, timesteps_out, 1)`
    fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, Self::Cache);

    /// Accumulate parameter gradients for `d loss / d output`
    fn backward(&mut self, cache: &Self::Cache, grad_output: &Array3<f64>);

    fn params(&self) -> Vec<&Param>;

    fn params_mut(&mut self) -> Vec<&mut Param>;

    fn predict(&self, x: &Array3<f64>) -> Array3<f64> {
        self.forward(x).0
    }

    fn zero_grad(&mut self) {
        for param in self.params_mut() {
            param.zero_grad();
        }
    }

    fn parameter_count(&self) -> usize {
        self.params().iter().map(|p| p.len()).sum()
    }
}
