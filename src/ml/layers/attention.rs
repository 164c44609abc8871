//! Multi-head self-attention and the post-norm transformer encoder layer

use ndarray::{s, Array2, Array3, Axis};
use rand::Rng;

use super::{from_rows, relu, relu_backward, to_rows, LayerNorm, LayerNormCache, Linear, Param};

fn softmax_rows(mut scores: Array2<f64>) -> Array2<f64> {
    for mut row in scores.outer_iter_mut() {
        let max = row.fold(f64::NEG_INFINITY, |acc, v| acc.max(*v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    scores
}

/// Scaled dot-product self-attention split over `heads` equal column blocks
#[derive(Debug, Clone)]
pub struct MultiHeadSelfAttention {
    heads: usize,
    pub query: Linear,
    pub key: Linear,
    pub value: Linear,
    pub output: Linear,
}

#[derive(Debug, Clone)]
pub struct AttentionCache {
    input: Array2<f64>,
    queries: Array2<f64>,
    keys: Array2<f64>,
    values: Array2<f64>,
    /// one `(steps, steps)` matrix per (example, head)
    weights: Vec<Array2<f64>>,
    context: Array2<f64>,
}

impl MultiHeadSelfAttention {
    /// `model_dim` must be divisible by `heads`
    pub fn new<R: Rng>(model_dim: usize, heads: usize, rng: &mut R) -> Self {
        debug_assert!(heads > 0 && model_dim % heads == 0);
        Self {
            heads,
            query: Linear::new(model_dim, model_dim, rng),
            key: Linear::new(model_dim, model_dim, rng),
            value: Linear::new(model_dim, model_dim, rng),
            output: Linear::new(model_dim, model_dim, rng),
        }
    }

    fn head_dim(&self) -> usize {
        self.query.output_dim() / self.heads
    }

    pub fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, AttentionCache) {
        let (batch, steps, model_dim) = x.dim();
        let head_dim = self.head_dim();
        let scale = 1.0 / (head_dim as f64).sqrt();

        let input = to_rows(x);
        let queries = self.query.forward(&input);
        let keys = self.key.forward(&input);
        let values = self.value.forward(&input);

        let mut context = Array2::zeros((batch * steps, model_dim));
        let mut weights = Vec::with_capacity(batch * self.heads);
        for b in 0..batch {
            let rows = b * steps..(b + 1) * steps;
            for head in 0..self.heads {
                let cols = head * head_dim..(head + 1) * head_dim;
                let q = queries.slice(s![rows.clone(), cols.clone()]);
                let k = keys.slice(s![rows.clone(), cols.clone()]);
                let v = values.slice(s![rows.clone(), cols.clone()]);

                let attention = softmax_rows(q.dot(&k.t()) * scale);
                context
                    .slice_mut(s![rows.clone(), cols])
                    .assign(&attention.dot(&v));
                weights.push(attention);
            }
        }

        let output = self.output.forward(&context);
        (
            from_rows(&output, batch, steps),
            AttentionCache {
                input,
                queries,
                keys,
                values,
                weights,
                context,
            },
        )
    }

    pub fn backward(&mut self, cache: &AttentionCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, model_dim) = grad_output.dim();
        let head_dim = self.head_dim();
        let scale = 1.0 / (head_dim as f64).sqrt();

        let d_context = self.output.backward(&cache.context, &to_rows(grad_output));

        let mut d_queries = Array2::zeros((batch * steps, model_dim));
        let mut d_keys = Array2::zeros((batch * steps, model_dim));
        let mut d_values = Array2::zeros((batch * steps, model_dim));
        for b in 0..batch {
            let rows = b * steps..(b + 1) * steps;
            for head in 0..self.heads {
                let cols = head * head_dim..(head + 1) * head_dim;
                let attention = &cache.weights[b * self.heads + head];
                let q = cache.queries.slice(s![rows.clone(), cols.clone()]);
                let k = cache.keys.slice(s![rows.clone(), cols.clone()]);
                let v = cache.values.slice(s![rows.clone(), cols.clone()]);
                let d_ctx = d_context.slice(s![rows.clone(), cols.clone()]);

                let d_attention = d_ctx.dot(&v.t());
                let row_dot = (&d_attention * attention)
                    .sum_axis(Axis(1))
                    .insert_axis(Axis(1));
                let d_scores = (attention * &(&d_attention - &row_dot)) * scale;

                d_values
                    .slice_mut(s![rows.clone(), cols.clone()])
                    .assign(&attention.t().dot(&d_ctx));
                d_queries
                    .slice_mut(s![rows.clone(), cols.clone()])
                    .assign(&d_scores.dot(&k));
                d_keys
                    .slice_mut(s![rows.clone(), cols])
                    .assign(&d_scores.t().dot(&q));
            }
        }

        let dx = self.query.backward(&cache.input, &d_queries)
            + self.key.backward(&cache.input, &d_keys)
            + self.value.backward(&cache.input, &d_values);
        from_rows(&dx, batch, steps)
    }

    pub fn params(&self) -> Vec<&Param> {
        [&self.query, &self.key, &self.value, &self.output]
            .into_iter()
            .flat_map(Linear::params)
            .collect()
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.query.params_mut();
        params.extend(self.key.params_mut());
        params.extend(self.value.params_mut());
        params.extend(self.output.params_mut());
        params
    }
}

/// Position-wise `Linear -> ReLU -> Linear` block
#[derive(Debug, Clone)]
pub struct FeedForward {
    pub expand: Linear,
    pub project: Linear,
}

#[derive(Debug, Clone)]
pub struct FeedForwardCache {
    input: Array2<f64>,
    hidden_pre: Array2<f64>,
    hidden: Array2<f64>,
}

impl FeedForward {
    pub fn new<R: Rng>(model_dim: usize, hidden: usize, rng: &mut R) -> Self {
        Self {
            expand: Linear::new(model_dim, hidden, rng),
            project: Linear::new(hidden, model_dim, rng),
        }
    }

    pub fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, FeedForwardCache) {
        let hidden_pre = self.expand.forward(x);
        let hidden = relu(&hidden_pre);
        let output = self.project.forward(&hidden);
        (
            output,
            FeedForwardCache {
                input: x.clone(),
                hidden_pre,
                hidden,
            },
        )
    }

    pub fn backward(&mut self, cache: &FeedForwardCache, grad_output: &Array2<f64>) -> Array2<f64> {
        let d_hidden = self.project.backward(&cache.hidden, grad_output);
        let d_pre = relu_backward(&cache.hidden_pre, &d_hidden);
        self.expand.backward(&cache.input, &d_pre)
    }

    pub fn params(&self) -> Vec<&Param> {
        let mut params = self.expand.params();
        params.extend(self.project.params());
        params
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.expand.params_mut();
        params.extend(self.project.params_mut());
        params
    }
}

/// Post-norm encoder layer:
/// `h = norm1(x + attention(x))`, `out = norm2(h + feed_forward(h))`
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    pub attention: MultiHeadSelfAttention,
    pub norm1: LayerNorm,
    pub feed_forward: FeedForward,
    pub norm2: LayerNorm,
}

#[derive(Debug, Clone)]
pub struct EncoderCache {
    attention: AttentionCache,
    norm1: LayerNormCache,
    feed_forward: FeedForwardCache,
    norm2: LayerNormCache,
}

impl EncoderLayer {
    pub fn new<R: Rng>(model_dim: usize, heads: usize, ff_hidden: usize, rng: &mut R) -> Self {
        Self {
            attention: MultiHeadSelfAttention::new(model_dim, heads, rng),
            norm1: LayerNorm::new(model_dim),
            feed_forward: FeedForward::new(model_dim, ff_hidden, rng),
            norm2: LayerNorm::new(model_dim),
        }
    }

    pub fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, EncoderCache) {
        let (batch, steps, _) = x.dim();

        let (attended, attention) = self.attention.forward(x);
        let (h, norm1) = self.norm1.forward(&to_rows(&(x + &attended)));
        let (expanded, feed_forward) = self.feed_forward.forward(&h);
        let (output, norm2) = self.norm2.forward(&(&h + &expanded));

        (
            from_rows(&output, batch, steps),
            EncoderCache {
                attention,
                norm1,
                feed_forward,
                norm2,
            },
        )
    }

    pub fn backward(&mut self, cache: &EncoderCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, _) = grad_output.dim();

        let d_sum2 = self.norm2.backward(&cache.norm2, &to_rows(grad_output));
        let d_h = &d_sum2 + &self.feed_forward.backward(&cache.feed_forward, &d_sum2);
        let d_sum1 = from_rows(&self.norm1.backward(&cache.norm1, &d_h), batch, steps);
        let d_attention = self.attention.backward(&cache.attention, &d_sum1);
        d_sum1 + d_attention
    }

    pub fn params(&self) -> Vec<&Param> {
        let mut params = self.attention.params();
        params.extend(self.norm1.params());
        params.extend(self.feed_forward.params());
        params.extend(self.norm2.params());
        params
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.attention.params_mut();
        params.extend(self.norm1.params_mut());
        params.extend(self.feed_forward.params_mut());
        params.extend(self.norm2.params_mut());
        params
    }
}
