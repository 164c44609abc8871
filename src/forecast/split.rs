//! Train/dev/test partitioning and the shuffle mapping
//!
//! Boundaries are measured backwards from the end of the example set:
//!
//! ```text
//! | unused | train | dev | test |
//! ```
//!
//! The permutation is applied to the full example set before slicing, so a
//! split-relative index has to go through [`ShuffleMapping`] to recover its
//! chronological position.

use std::ops::Range;

use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tracing::warn;

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DatasetSplit {
    Train,
    Dev,
    Test,
    All,
}

/// Where a chronological example index ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLocation {
    Split(DatasetSplit),
    Unused,
    OutOfRange,
}

/// Requested split sizes in examples; `train: None` takes everything left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitSizes {
    pub train: Option<usize>,
    pub dev: usize,
    pub test: usize,
}

/// Permutation of example indices plus its inverse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleMapping {
    /// shuffled position -> chronological index
    permutation: Vec<usize>,
    /// chronological index -> shuffled position
    position: Vec<usize>,
}

impl ShuffleMapping {
    pub fn identity(len: usize) -> Self {
        Self {
            permutation: (0..len).collect(),
            position: (0..len).collect(),
        }
    }

    pub fn shuffled(len: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut permutation: Vec<usize> = (0..len).collect();
        permutation.shuffle(&mut rng);

        let mut position = vec![0; len];
        for (shuffled, chronological) in permutation.iter().enumerate() {
            position[*chronological] = shuffled;
        }
        Self {
            permutation,
            position,
        }
    }

    pub fn len(&self) -> usize {
        self.permutation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutation.is_empty()
    }

    pub fn chronological(&self, shuffled: usize) -> Option<usize> {
        self.permutation.get(shuffled).copied()
    }

    pub fn shuffled_position(&self, chronological: usize) -> Option<usize> {
        self.position.get(chronological).copied()
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }
}

/// Split boundaries over the (possibly shuffled) example set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPartition {
    mapping: ShuffleMapping,
    unused: usize,
    train: Range<usize>,
    dev: Range<usize>,
    test: Range<usize>,
}

impl DatasetPartition {
    /// Partition `total` examples.
    ///
    /// Sizes that do not fit the example set are an [`ForecastError::InvalidSplit`].
    /// An empty example set yields empty splits whatever the requested sizes.
    pub fn new(total: usize, sizes: SplitSizes, mapping: ShuffleMapping) -> Result<Self> {
        if mapping.len() != total {
            return Err(ForecastError::InvalidSplit(format!(
                "shuffle mapping covers {} examples, dataset has {}",
                mapping.len(),
                total
            )));
        }
        if total == 0 {
            warn!(
                requested_dev = sizes.dev,
                requested_test = sizes.test,
                "no examples to partition"
            );
            return Ok(Self {
                mapping,
                unused: 0,
                train: 0..0,
                dev: 0..0,
                test: 0..0,
            });
        }

        let held_out = sizes.dev + sizes.test;
        if held_out > total {
            return Err(ForecastError::InvalidSplit(format!(
                "dev_size {} + test_size {} exceeds the {} available examples",
                sizes.dev, sizes.test, total
            )));
        }
        let remaining = total - held_out;
        let train = match sizes.train {
            Some(train) if train > remaining => {
                return Err(ForecastError::InvalidSplit(format!(
                    "train_size {} exceeds the {} examples before the dev split",
                    train, remaining
                )));
            }
            Some(train) => train,
            None => remaining,
        };
        let (dev, test) = (sizes.dev, sizes.test);

        let unused = remaining - train;
        let train_end = unused + train;
        let dev_end = train_end + dev;
        Ok(Self {
            mapping,
            unused,
            train: unused..train_end,
            dev: train_end..dev_end,
            test: dev_end..total,
        })
    }

    pub fn total(&self) -> usize {
        self.mapping.len()
    }

    pub fn mapping(&self) -> &ShuffleMapping {
        &self.mapping
    }

    pub fn range(&self, split: DatasetSplit) -> Range<usize> {
        match split {
            DatasetSplit::Train => self.train.clone(),
            DatasetSplit::Dev => self.dev.clone(),
            DatasetSplit::Test => self.test.clone(),
            DatasetSplit::All => 0..self.total(),
        }
    }

    pub fn len(&self, split: DatasetSplit) -> usize {
        self.range(split).len()
    }

    pub fn unused_len(&self) -> usize {
        self.unused
    }

    /// Chronological indices of the examples in `split`, in split order.
    ///
    /// `All` stays chronological regardless of shuffling.
    pub fn indices(&self, split: DatasetSplit) -> Vec<usize> {
        match split {
            DatasetSplit::All => (0..self.total()).collect(),
            _ => self.mapping.permutation()[self.range(split)].to_vec(),
        }
    }

    /// Chronological index of the `index`-th example of `split`
    pub fn unshuffled_index(&self, split: DatasetSplit, index: usize) -> Result<usize> {
        let len = self.len(split);
        if index >= len {
            return Err(ForecastError::IndexOutOfRange { split, index, len });
        }
        match split {
            DatasetSplit::All => Ok(index),
            _ => self
                .mapping
                .chronological(self.range(split).start + index)
                .ok_or(ForecastError::IndexOutOfRange { split, index, len }),
        }
    }

    /// Split holding the chronological example `index`
    pub fn location_of(&self, index: usize) -> IndexLocation {
        let Some(position) = self.mapping.shuffled_position(index) else {
            return IndexLocation::OutOfRange;
        };
        if self.train.contains(&position) {
            IndexLocation::Split(DatasetSplit::Train)
        } else if self.dev.contains(&position) {
            IndexLocation::Split(DatasetSplit::Dev)
        } else if self.test.contains(&position) {
            IndexLocation::Split(DatasetSplit::Test)
        } else {
            IndexLocation::Unused
        }
    }

    /// Rows of a chronologically stacked tensor that belong to `split`
    pub fn select(&self, data: &Array3<f64>, split: DatasetSplit) -> Array3<f64> {
        data.select(Axis(0), &self.indices(split))
    }
}
