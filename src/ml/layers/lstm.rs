use ndarray::{s, Array2, Array3, Axis};
use rand::Rng;

use super::{sigmoid, Param};

/// Single-direction LSTM over `(batch, steps, input)`, returning every hidden state.
///
/// Gate columns are laid out as `[input | forget | cell | output]`; the
/// initial hidden and cell states are zero.
#[derive(Debug, Clone)]
pub struct Lstm {
    hidden: usize,
    pub w_input: Param,
    pub w_hidden: Param,
    pub bias: Param,
}

#[derive(Debug, Clone)]
pub struct LstmCache {
    inputs: Vec<Array2<f64>>,
    prev_hidden: Vec<Array2<f64>>,
    prev_cell: Vec<Array2<f64>>,
    /// activated gates per step
    gates: Vec<Array2<f64>>,
    cell_tanh: Vec<Array2<f64>>,
}

impl Lstm {
    pub fn new<R: Rng>(input: usize, hidden: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (hidden.max(1) as f64).sqrt();
        Self {
            hidden,
            w_input: Param::uniform(input, 4 * hidden, bound, rng),
            w_hidden: Param::uniform(hidden, 4 * hidden, bound, rng),
            bias: Param::uniform(1, 4 * hidden, bound, rng),
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    pub fn input_size(&self) -> usize {
        self.w_input.value.nrows()
    }

    pub fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, LstmCache) {
        let (batch, steps, _) = x.dim();
        let h = self.hidden;

        let mut output = Array3::zeros((batch, steps, h));
        let mut cache = LstmCache {
            inputs: Vec::with_capacity(steps),
            prev_hidden: Vec::with_capacity(steps),
            prev_cell: Vec::with_capacity(steps),
            gates: Vec::with_capacity(steps),
            cell_tanh: Vec::with_capacity(steps),
        };
        let mut hidden_state = Array2::zeros((batch, h));
        let mut cell_state = Array2::zeros((batch, h));

        for t in 0..steps {
            let x_t = x.index_axis(Axis(1), t).to_owned();
            let mut gates = x_t.dot(&self.w_input.value)
                + hidden_state.dot(&self.w_hidden.value)
                + &self.bias.value;
            gates.slice_mut(s![.., ..2 * h]).mapv_inplace(sigmoid);
            gates.slice_mut(s![.., 2 * h..3 * h]).mapv_inplace(f64::tanh);
            gates.slice_mut(s![.., 3 * h..]).mapv_inplace(sigmoid);

            let cell = {
                let input_gate = gates.slice(s![.., ..h]);
                let forget_gate = gates.slice(s![.., h..2 * h]);
                let candidate = gates.slice(s![.., 2 * h..3 * h]);
                &forget_gate * &cell_state + &input_gate * &candidate
            };
            let cell_tanh = cell.mapv(f64::tanh);
            let next_hidden = &gates.slice(s![.., 3 * h..]) * &cell_tanh;
            output.index_axis_mut(Axis(1), t).assign(&next_hidden);

            cache.inputs.push(x_t);
            cache.prev_hidden.push(hidden_state);
            cache.prev_cell.push(cell_state);
            cache.gates.push(gates);
            cache.cell_tanh.push(cell_tanh);
            hidden_state = next_hidden;
            cell_state = cell;
        }

        (output, cache)
    }

    /// Backpropagation through time; `grad_output` matches the forward output
    pub fn backward(&mut self, cache: &LstmCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let (batch, steps, _) = grad_output.dim();
        let h = self.hidden;

        let mut grad_input = Array3::zeros((batch, steps, self.w_input.value.nrows()));
        let mut dh_next = Array2::<f64>::zeros((batch, h));
        let mut dc_next = Array2::<f64>::zeros((batch, h));

        for t in (0..steps).rev() {
            let gates = &cache.gates[t];
            let input_gate = gates.slice(s![.., ..h]);
            let forget_gate = gates.slice(s![.., h..2 * h]);
            let candidate = gates.slice(s![.., 2 * h..3 * h]);
            let output_gate = gates.slice(s![.., 3 * h..]);
            let cell_tanh = &cache.cell_tanh[t];

            let dh = &grad_output.index_axis(Axis(1), t) + &dh_next;
            let d_output = &dh * cell_tanh;
            let dc = &dh * &output_gate * &cell_tanh.mapv(|v| 1.0 - v * v) + &dc_next;

            let mut dz = Array2::zeros((batch, 4 * h));
            dz.slice_mut(s![.., ..h])
                .assign(&(&dc * &candidate * &input_gate.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., h..2 * h])
                .assign(&(&dc * &cache.prev_cell[t] * &forget_gate.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * h..3 * h])
                .assign(&(&dc * &input_gate * &candidate.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * h..])
                .assign(&(&d_output * &output_gate.mapv(|v| v * (1.0 - v))));
            dc_next = &dc * &forget_gate;

            self.w_input.grad += &cache.inputs[t].t().dot(&dz);
            self.w_hidden.grad += &cache.prev_hidden[t].t().dot(&dz);
            self.bias.grad += &dz.sum_axis(Axis(0)).insert_axis(Axis(0));

            grad_input
                .index_axis_mut(Axis(1), t)
                .assign(&dz.dot(&self.w_input.value.t()));
            dh_next = dz.dot(&self.w_hidden.value.t());
        }

        grad_input
    }

    pub fn params(&self) -> Vec<&Param> {
        vec![&self.w_input, &self.w_hidden, &self.bias]
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.w_input, &mut self.w_hidden, &mut self.bias]
    }
}

fn reverse_time(x: &Array3<f64>) -> Array3<f64> {
    x.slice(s![.., ..;-1, ..]).to_owned()
}

/// Bidirectional LSTM; output concatenates forward and backward states
#[derive(Debug, Clone)]
pub struct BiLstm {
    pub fwd: Lstm,
    pub bwd: Lstm,
}

#[derive(Debug, Clone)]
pub struct BiLstmCache {
    fwd: LstmCache,
    bwd: LstmCache,
}

impl BiLstm {
    pub fn new<R: Rng>(input: usize, hidden: usize, rng: &mut R) -> Self {
        Self {
            fwd: Lstm::new(input, hidden, rng),
            bwd: Lstm::new(input, hidden, rng),
        }
    }

    pub fn output_size(&self) -> usize {
        self.fwd.hidden_size() + self.bwd.hidden_size()
    }

    pub fn forward(&self, x: &Array3<f64>) -> (Array3<f64>, BiLstmCache) {
        let (batch, steps, _) = x.dim();
        let h = self.fwd.hidden_size();

        let (fwd_out, fwd_cache) = self.fwd.forward(x);
        let (bwd_out, bwd_cache) = self.bwd.forward(&reverse_time(x));

        let mut output = Array3::zeros((batch, steps, self.output_size()));
        output.slice_mut(s![.., .., ..h]).assign(&fwd_out);
        output.slice_mut(s![.., .., h..]).assign(&reverse_time(&bwd_out));

        (
            output,
            BiLstmCache {
                fwd: fwd_cache,
                bwd: bwd_cache,
            },
        )
    }

    pub fn backward(&mut self, cache: &BiLstmCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let h = self.fwd.hidden_size();
        let grad_fwd = grad_output.slice(s![.., .., ..h]).to_owned();
        let grad_bwd = reverse_time(&grad_output.slice(s![.., .., h..]).to_owned());

        let dx_fwd = self.fwd.backward(&cache.fwd, &grad_fwd);
        let dx_bwd = self.bwd.backward(&cache.bwd, &grad_bwd);
        dx_fwd + reverse_time(&dx_bwd)
    }

    pub fn params(&self) -> Vec<&Param> {
        let mut params = self.fwd.params();
        params.extend(self.bwd.params());
        params
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.fwd.params_mut();
        params.extend(self.bwd.params_mut());
        params
    }
}
