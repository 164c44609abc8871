use ndarray::{Array2, Array3};
use rand::Rng;

use crate::ml::layers::{
    from_rows, to_rows, HeadCache, LayerNorm, LayerNormCache, Linear, Lstm, LstmCache, OutputHead,
    Param,
};
use crate::ml::network::Network;

pub const MEMORY_DIM: usize = 16;
pub const MEMORY_BLOCKS: usize = 2;

/// Pre-norm residual block: `x + lstm(norm(x))`
#[derive(Debug, Clone)]
pub struct ResidualLstmBlock {
    pub norm: LayerNorm,
    pub lstm: Lstm,
}

pub struct ResidualLstmCache {
    norm: LayerNormCache,
    lstm: LstmCache,
}

impl ResidualLstmBlock {
    pub fn new<R: Rng>(dim: usize, rng: &mut R) -> Self {
        Self {
            norm: LayerNorm::new(dim),
            lstm: Lstm::new(dim, dim, rng),
        }
    }

    pub fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, ResidualLstmCache) {
        let (batch, steps, _) = x.dim();
        let (normalized, norm) = self.norm.forward(&to_rows(x));
        let (memory, lstm) = self.lstm.forward(&from_rows(&normalized, batch, steps));
        (x + &memory, ResidualLstmCache { norm, lstm })
    }

    pub fn backward(&mut self, cache: &ResidualLstmCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, _) = grad_output.dim();
        let d_normalized = self.lstm.backward(&cache.lstm, grad_output);
        let d_input = self.norm.backward(&cache.norm, &to_rows(&d_normalized));
        grad_output + &from_rows(&d_input, batch, steps)
    }

    pub fn params(&self) -> Vec<&Param> {
        let mut params = self.norm.params();
        params.extend(self.lstm.params());
        params
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.norm.params_mut();
        params.extend(self.lstm.params_mut());
        params
    }
}

/// Input projection, a stack of residual LSTM blocks, output head
#[derive(Debug, Clone)]
pub struct ExtendedMemoryNet {
    pub projection: Linear,
    pub blocks: Vec<ResidualLstmBlock>,
    pub head: OutputHead,
}

pub struct ExtendedMemoryCache {
    input: Array2<f64>,
    blocks: Vec<ResidualLstmCache>,
    head: HeadCache,
}

impl ExtendedMemoryNet {
    pub fn new<R: Rng>(features: usize, timesteps_out: usize, rng: &mut R) -> Self {
        Self::with_blocks(features, timesteps_out, MEMORY_BLOCKS, rng)
    }

    pub fn with_blocks<R: Rng>(
        features: usize,
        timesteps_out: usize,
        blocks: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            projection: Linear::new(features, MEMORY_DIM, rng),
            blocks: (0..blocks)
                .map(|_| ResidualLstmBlock::new(MEMORY_DIM, rng))
                .collect(),
            head: OutputHead::new(MEMORY_DIM, timesteps_out, rng),
        }
    }
}

impl Network for ExtendedMemoryNet {
    type Cache = ExtendedMemoryCache;

    fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, Self::Cache) {
        let (batch, steps, _) = x.dim();
        let input = to_rows(x);
        let mut hidden = from_rows(&self.projection.forward(&input), batch, steps);

        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (next, cache) = block.forward(&hidden);
            blocks.push(cache);
            hidden = next;
        }

        let (output, head) = self.head.forward(&hidden);
        (
            output,
            ExtendedMemoryCache {
                input,
                blocks,
                head,
            },
        )
    }

    fn backward(&mut self, cache: &Self::Cache, grad_output: &Array3<f64>) {
        let mut grad = self.head.backward(&cache.head, grad_output);
        for (block, block_cache) in self.blocks.iter_mut().zip(&cache.blocks).rev() {
            grad = block.backward(block_cache, &grad);
        }
        self.projection.backward(&cache.input, &to_rows(&grad));
    }

    fn params(&self) -> Vec<&Param> {
        let mut params = self.projection.params();
        for block in &self.blocks {
            params.extend(block.params());
        }
        params.extend(self.head.params());
        params
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.projection.params_mut();
        for block in &mut self.blocks {
            params.extend(block.params_mut());
        }
        params.extend(self.head.params_mut());
        params
    }
}
