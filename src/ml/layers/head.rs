use ndarray::{s, Array2, Array3, ArrayView3, Axis};
use rand::Rng;

use super::{from_rows, relu, relu_backward, to_rows, Linear, Param};

/// Width of the hidden dense layers of the output head
pub const HEAD_UNITS: usize = 10;

/// Keep only the trailing `count` timesteps of every example
pub fn last_timesteps(x: &Array3<f64>, count: usize) -> ArrayView3<'_, f64> {
    let steps = x.len_of(Axis(1));
    x.slice(s![.., steps.saturating_sub(count).., ..])
}

/// Shared regression head: last `timesteps_out` steps, then
/// `Dense(10) ReLU -> Dense(10) ReLU -> Dense(1)` per step.
#[derive(Debug, Clone)]
pub struct OutputHead {
    timesteps_out: usize,
    pub hidden1: Linear,
    pub hidden2: Linear,
    pub output: Linear,
}

#[derive(Debug, Clone)]
pub struct HeadCache {
    input_dim: (usize, usize, usize),
    selected: Array2<f64>,
    pre1: Array2<f64>,
    act1: Array2<f64>,
    pre2: Array2<f64>,
    act2: Array2<f64>,
}

impl OutputHead {
    pub fn new<R: Rng>(input: usize, timesteps_out: usize, rng: &mut R) -> Self {
        Self {
            timesteps_out,
            hidden1: Linear::new(input, HEAD_UNITS, rng),
            hidden2: Linear::new(HEAD_UNITS, HEAD_UNITS, rng),
            output: Linear::new(HEAD_UNITS, 1, rng),
        }
    }

    pub fn timesteps_out(&self) -> usize {
        self.timesteps_out
    }

    pub fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, HeadCache) {
        let window = last_timesteps(x, self.timesteps_out).to_owned();
        let (batch, steps, _) = window.dim();

        let selected = to_rows(&window);
        let pre1 = self.hidden1.forward(&selected);
        let act1 = relu(&pre1);
        let pre2 = self.hidden2.forward(&act1);
        let act2 = relu(&pre2);
        let output = self.output.forward(&act2);

        (
            from_rows(&output, batch, steps),
            HeadCache {
                input_dim: x.dim(),
                selected,
                pre1,
                act1,
                pre2,
                act2,
            },
        )
    }

    pub fn backward(&mut self, cache: &HeadCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, _) = grad_output.dim();

        let d_act2 = self.output.backward(&cache.act2, &to_rows(grad_output));
        let d_pre2 = relu_backward(&cache.pre2, &d_act2);
        let d_act1 = self.hidden2.backward(&cache.act1, &d_pre2);
        let d_pre1 = relu_backward(&cache.pre1, &d_act1);
        let d_selected = self.hidden1.backward(&cache.selected, &d_pre1);

        let (_, input_steps, features) = cache.input_dim;
        let mut grad_input = Array3::zeros((batch, input_steps, features));
        grad_input
            .slice_mut(s![.., input_steps - steps.., ..])
            .assign(&from_rows(&d_selected, batch, steps));
        grad_input
    }

    pub fn params(&self) -> Vec<&Param> {
        let mut params = self.hidden1.params();
        params.extend(self.hidden2.params());
        params.extend(self.output.params());
        params
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.hidden1.params_mut();
        params.extend(self.hidden2.params_mut());
        params.extend(self.output.params_mut());
        params
    }
}
