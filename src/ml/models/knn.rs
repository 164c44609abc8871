use ndarray::{Array2, Array3, Axis};

use crate::error::{ForecastError, Result};

/// Nearest neighbour on flattened input windows.
///
/// Returns the training target of the closest training window (squared
/// Euclidean distance); ties go to the earliest training example.
#[derive(Debug, Clone, Default)]
pub struct KnnModel {
    reference: Option<Reference>,
}

#[derive(Debug, Clone)]
struct Reference {
    /// `(timesteps, features)` of the stored windows
    window: (usize, usize),
    inputs: Array2<f64>,
    targets: Array3<f64>,
}

impl KnnModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trailing `(timesteps, features)` shape queries must match, once trained
    pub fn window_shape(&self) -> Option<(usize, usize)> {
        self.reference.as_ref().map(|r| r.window)
    }

    pub fn train_model(&mut self, x: &Array3<f64>, y: &Array3<f64>) -> Result<()> {
        if x.len_of(Axis(0)) != y.len_of(Axis(0)) {
            return Err(ForecastError::ShapeMismatch {
                context: "nearest neighbour training set",
                expected: vec![x.len_of(Axis(0))],
                actual: vec![y.len_of(Axis(0))],
            });
        }
        let (rows, timesteps, features) = x.dim();
        let inputs = x
            .as_standard_layout()
            .into_owned()
            .into_shape((rows, timesteps * features))
            .map_err(|_| ForecastError::ShapeMismatch {
                context: "nearest neighbour training set",
                expected: vec![rows, timesteps * features],
                actual: x.shape().to_vec(),
            })?;
        self.reference = Some(Reference {
            window: (timesteps, features),
            inputs,
            targets: y.to_owned(),
        });
        Ok(())
    }

    pub fn predict(&self, x: &Array3<f64>) -> Result<Array3<f64>> {
        let Reference {
            window,
            inputs: reference,
            targets,
        } = self.reference.as_ref().ok_or(ForecastError::NotTrained)?;
        let (examples, timesteps, features) = x.dim();
        if (timesteps, features) != *window {
            return Err(ForecastError::ShapeMismatch {
                context: "nearest neighbour query",
                expected: vec![examples, window.0, window.1],
                actual: x.shape().to_vec(),
            });
        }
        let (_, steps_out, outputs) = targets.dim();
        if examples > 0 && reference.nrows() == 0 {
            return Err(ForecastError::NotTrained);
        }

        let width = reference.ncols();
        let queries = x
            .as_standard_layout()
            .into_owned()
            .into_shape((examples, width))
            .map_err(|_| ForecastError::ShapeMismatch {
                context: "nearest neighbour query",
                expected: vec![examples, width],
                actual: x.shape().to_vec(),
            })?;

        let mut prediction = Array3::zeros((examples, steps_out, outputs));
        for (query, mut out) in queries.outer_iter().zip(prediction.outer_iter_mut()) {
            let mut best = (0, f64::INFINITY);
            for (i, candidate) in reference.outer_iter().enumerate() {
                let distance: f64 = candidate
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if distance < best.1 {
                    best = (i, distance);
                }
            }
            out.assign(&targets.index_axis(Axis(0), best.0));
        }
        Ok(prediction)
    }
}
