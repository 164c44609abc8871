use ndarray::{Array2, Zip};

use super::layers::Param;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Adam with bias-corrected moment estimates
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    step: i32,
    first_moment: Vec<Array2<f64>>,
    second_moment: Vec<Array2<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Apply one update; `params` must come in the same order on every call
    pub fn step(&mut self, params: Vec<&mut Param>) {
        if self.first_moment.len() != params.len() {
            self.first_moment = params.iter().map(|p| Array2::zeros(p.value.raw_dim())).collect();
            self.second_moment = self.first_moment.clone();
        }
        self.step += 1;
        let correction1 = 1.0 - BETA1.powi(self.step);
        let correction2 = 1.0 - BETA2.powi(self.step);
        let lr = self.learning_rate;

        for ((param, m), v) in params
            .into_iter()
            .zip(self.first_moment.iter_mut())
            .zip(self.second_moment.iter_mut())
        {
            Zip::from(&mut param.value)
                .and(&param.grad)
                .and(m)
                .and(v)
                .for_each(|w, g, m, v| {
                    *m = BETA1 * *m + (1.0 - BETA1) * g;
                    *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                    let m_hat = *m / correction1;
                    let v_hat = *v / correction2;
                    *w -= lr * m_hat / (v_hat.sqrt() + EPSILON);
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut param = Param::new(array![[1.0, -1.0]]);
        param.grad = array![[0.5, -2.0]];
        let mut adam = Adam::new(0.1);
        adam.step(vec![&mut param]);

        // bias correction makes the first step exactly lr * sign(grad)
        assert!((param.value[[0, 0]] - 0.9).abs() < 1e-6);
        assert!((param.value[[0, 1]] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut param = Param::new(array![[3.0]]);
        let mut adam = Adam::new(0.1);
        for _ in 0..1000 {
            param.grad = param.value.mapv(|w| 2.0 * (w - 1.0));
            adam.step(vec![&mut param]);
        }
        assert!((param.value[[0, 0]] - 1.0).abs() < 5e-2);
    }
}
