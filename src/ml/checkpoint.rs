//! Pretrained weight files
//!
//! One bincode file per model variant, `pretrained_weights_<Kind>.bin`,
//! holding the variant and its parameter matrices in `params()` order.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::layers::Param;
use super::ModelKind;
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Checkpoint {
    kind: ModelKind,
    parameters: Vec<Array2<f64>>,
}

pub fn weights_path(dir: &Path, kind: ModelKind) -> PathBuf {
    dir.join(format!("pretrained_weights_{}.bin", kind))
}

pub fn save(dir: &Path, kind: ModelKind, params: &[&Param]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = weights_path(dir, kind);
    let checkpoint = Checkpoint {
        kind,
        parameters: params.iter().map(|p| p.value.clone()).collect(),
    };

    let writer = BufWriter::new(File::create(&path)?);
    bincode::serialize_into(writer, &checkpoint)
        .map_err(|e| ForecastError::Checkpoint(format!("failed to write {}: {}", path.display(), e)))?;

    info!(model = %kind, path = %path.display(), tensors = checkpoint.parameters.len(), "saved pretrained weights");
    Ok(path)
}

/// Overwrite `params` with the stored weights of `kind`
pub fn load_into(dir: &Path, kind: ModelKind, params: Vec<&mut Param>) -> Result<PathBuf> {
    let path = weights_path(dir, kind);
    if !path.is_file() {
        return Err(ForecastError::MissingPretrainedWeights(path));
    }

    let reader = BufReader::new(File::open(&path)?);
    let checkpoint: Checkpoint = bincode::deserialize_from(reader)
        .map_err(|e| ForecastError::Checkpoint(format!("failed to read {}: {}", path.display(), e)))?;

    if checkpoint.kind != kind {
        return Err(ForecastError::Checkpoint(format!(
            "{} holds weights for {}, expected {}",
            path.display(),
            checkpoint.kind,
            kind
        )));
    }
    if checkpoint.parameters.len() != params.len() {
        return Err(ForecastError::Checkpoint(format!(
            "{} holds {} tensors, model has {}",
            path.display(),
            checkpoint.parameters.len(),
            params.len()
        )));
    }
    if let Some((stored, param)) = checkpoint
        .parameters
        .iter()
        .zip(params.iter())
        .find(|(stored, param)| stored.dim() != param.value.dim())
    {
        return Err(ForecastError::ShapeMismatch {
            context: "pretrained weights",
            expected: param.value.shape().to_vec(),
            actual: stored.shape().to_vec(),
        });
    }

    for (stored, param) in checkpoint.parameters.into_iter().zip(params) {
        param.value = stored;
        param.zero_grad();
    }

    info!(model = %kind, path = %path.display(), "loaded pretrained weights");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("load-forecast-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_save_then_load() {
        let dir = scratch_dir();
        let a = Param::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let b = Param::new(array![[0.5]]);
        let path = save(&dir, ModelKind::TransformerNet, &[&a, &b]).unwrap();
        assert!(path.ends_with("pretrained_weights_TransformerNet.bin"));

        let mut a2 = Param::new(Array2::zeros((2, 2)));
        let mut b2 = Param::new(Array2::zeros((1, 1)));
        load_into(&dir, ModelKind::TransformerNet, vec![&mut a2, &mut b2]).unwrap();
        assert_eq!(a2.value, a.value);
        assert_eq!(b2.value, b.value);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_weights_are_fatal() {
        let dir = scratch_dir();
        let mut p = Param::new(Array2::zeros((1, 1)));
        assert!(matches!(
            load_into(&dir, ModelKind::RecurrentNet, vec![&mut p]),
            Err(ForecastError::MissingPretrainedWeights(_))
        ));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let dir = scratch_dir();
        let stored = Param::new(Array2::zeros((2, 3)));
        save(&dir, ModelKind::ExtendedMemoryNet, &[&stored]).unwrap();

        let mut wrong = Param::new(Array2::zeros((3, 2)));
        assert!(matches!(
            load_into(&dir, ModelKind::ExtendedMemoryNet, vec![&mut wrong]),
            Err(ForecastError::ShapeMismatch { .. })
        ));
        fs::remove_dir_all(dir).ok();
    }
}
