use ndarray::{Array2, Array3};
use rand::Rng;

use crate::ml::layers::{
    from_rows, to_rows, EncoderCache, EncoderLayer, HeadCache, Linear, OutputHead, Param,
};
use crate::ml::network::Network;

pub const MODEL_DIM: usize = 16;
pub const ATTENTION_HEADS: usize = 4;
pub const FEED_FORWARD_UNITS: usize = 64;

/// Input projection, one post-norm encoder layer, output head
#[derive(Debug, Clone)]
pub struct TransformerNet {
    pub projection: Linear,
    pub encoder: EncoderLayer,
    pub head: OutputHead,
}

pub struct TransformerCache {
    input: Array2<f64>,
    encoder: EncoderCache,
    head: HeadCache,
}

impl TransformerNet {
    pub fn new<R: Rng>(features: usize, timesteps_out: usize, rng: &mut R) -> Self {
        Self {
            projection: Linear::new(features, MODEL_DIM, rng),
            encoder: EncoderLayer::new(MODEL_DIM, ATTENTION_HEADS, FEED_FORWARD_UNITS, rng),
            head: OutputHead::new(MODEL_DIM, timesteps_out, rng),
        }
    }
}

impl Network for TransformerNet {
    type Cache = TransformerCache;

    fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, Self::Cache) {
        let (batch, steps, _) = x.dim();
        let input = to_rows(x);
        let projected = from_rows(&self.projection.forward(&input), batch, steps);
        let (encoded, encoder) = self.encoder.forward(&projected);
        let (output, head) = self.head.forward(&encoded);
        (
            output,
            TransformerCache {
                input,
                encoder,
                head,
            },
        )
    }

    fn backward(&mut self, cache: &Self::Cache, grad_output: &Array3<f64>) {
        let d_encoded = self.head.backward(&cache.head, grad_output);
        let d_projected = self.encoder.backward(&cache.encoder, &d_encoded);
        self.projection.backward(&cache.input, &to_rows(&d_projected));
    }

    fn params(&self) -> Vec<&Param> {
        let mut params = self.projection.params();
        params.extend(self.encoder.params());
        params.extend(self.head.params());
        params
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.projection.params_mut();
        params.extend(self.encoder.params_mut());
        params.extend(self.head.params_mut());
        params
    }
}
