use ndarray::Array3;
use rand::Rng;

use crate::ml::layers::{BiLstm, BiLstmCache, HeadCache, OutputHead, Param};
use crate::ml::network::Network;

pub const RECURRENT_UNITS: [usize; 2] = [50, 10];

/// Two stacked bidirectional LSTM layers feeding the output head
#[derive(Debug, Clone)]
pub struct RecurrentNet {
    pub first: BiLstm,
    pub second: BiLstm,
    pub head: OutputHead,
}

pub struct RecurrentCache {
    first: BiLstmCache,
    second: BiLstmCache,
    head: HeadCache,
}

impl RecurrentNet {
    pub fn new<R: Rng>(features: usize, timesteps_out: usize, rng: &mut R) -> Self {
        Self::with_units(features, timesteps_out, RECURRENT_UNITS, rng)
    }

    pub fn with_units<R: Rng>(
        features: usize,
        timesteps_out: usize,
        units: [usize; 2],
        rng: &mut R,
    ) -> Self {
        let first = BiLstm::new(features, units[0], rng);
        let second = BiLstm::new(first.output_size(), units[1], rng);
        let head = OutputHead::new(second.output_size(), timesteps_out, rng);
        Self {
            first,
            second,
            head,
        }
    }
}

impl Network for RecurrentNet {
    type Cache = RecurrentCache;

    fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, Self::Cache) {
        let (h1, first) = self.first.forward(x);
        let (h2, second) = self.second.forward(&h1);
        let (output, head) = self.head.forward(&h2);
        (
            output,
            RecurrentCache {
                first,
                second,
                head,
            },
        )
    }

    fn backward(&mut self, cache: &Self::Cache, grad_output: &Array3<f64>) {
        let d_h2 = self.head.backward(&cache.head, grad_output);
        let d_h1 = self.second.backward(&cache.second, &d_h2);
        self.first.backward(&cache.first, &d_h1);
    }

    fn params(&self) -> Vec<&Param> {
        let mut params = self.first.params();
        params.extend(self.second.params());
        params.extend(self.head.params());
        params
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.first.params_mut();
        params.extend(self.second.params_mut());
        params.extend(self.head.params_mut());
        params
    }
}
