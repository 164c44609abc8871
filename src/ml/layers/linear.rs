use ndarray::{Array2, Axis};
use rand::Rng;

use super::Param;

/// Fully connected layer applied row-wise: `y = x W + b`
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Param,
    pub bias: Param,
}

impl Linear {
    pub fn new<R: Rng>(input: usize, output: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (input.max(1) as f64).sqrt();
        Self {
            weight: Param::uniform(input, output, bound, rng),
            bias: Param::uniform(1, output, bound, rng),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weight.value) + &self.bias.value
    }

    /// `x` must be the input passed to the matching `forward`
    pub fn backward(&mut self, x: &Array2<f64>, grad_output: &Array2<f64>) -> Array2<f64> {
        self.weight.grad += &x.t().dot(grad_output);
        self.bias.grad += &grad_output.sum_axis(Axis(0)).insert_axis(Axis(0));
        grad_output.dot(&self.weight.value.t())
    }

    pub fn params(&self) -> Vec<&Param> {
        vec![&self.weight, &self.bias]
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests {
    use super::super::gradcheck::{assert_close, random, rng, STEP};
    use super::*;

    #[test]
    fn test_shapes() {
        let layer = Linear::new(3, 5, &mut rng(0));
        let out = layer.forward(&Array2::zeros((4, 3)));
        assert_eq!(out.dim(), (4, 5));
        // zero input yields the bias on every row
        assert_eq!(out.row(2), layer.bias.value.row(0));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut layer = Linear::new(3, 2, &mut rng(1));
        let x: Array2<f64> = random((4, 3), 2);
        let upstream: Array2<f64> = random((4, 2), 3);
        let loss = |l: &Linear, x: &Array2<f64>| (l.forward(x) * &upstream).sum();

        let grad_x = layer.backward(&x, &upstream);

        for (r, c) in [(0, 0), (2, 1), (3, 2)] {
            let mut plus = x.clone();
            plus[[r, c]] += STEP;
            let mut minus = x.clone();
            minus[[r, c]] -= STEP;
            let numeric = (loss(&layer, &plus) - loss(&layer, &minus)) / (2.0 * STEP);
            assert_close(grad_x[[r, c]], numeric, "input");
        }

        for (r, c) in [(0, 0), (1, 1), (2, 0)] {
            let mut plus = layer.clone();
            plus.weight.value[[r, c]] += STEP;
            let mut minus = layer.clone();
            minus.weight.value[[r, c]] -= STEP;
            let numeric = (loss(&plus, &x) - loss(&minus, &x)) / (2.0 * STEP);
            assert_close(layer.weight.grad[[r, c]], numeric, "weight");
        }

        let mut plus = layer.clone();
        plus.bias.value[[0, 1]] += STEP;
        let mut minus = layer.clone();
        minus.bias.value[[0, 1]] -= STEP;
        let numeric = (loss(&plus, &x) - loss(&minus, &x)) / (2.0 * STEP);
        assert_close(layer.bias.grad[[0, 1]], numeric, "bias");
    }
}
