use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod split;
pub mod synthetic;

pub use split::{read_json, write_json};

/// Features and targets in the layout the upstream generator hands over
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "split::RawLabeledDataset", into = "split::RawLabeledDataset")]
pub struct LabeledDataset {
    /// Feature-dimension-major: one row per feature, one column per sample
    pub x: Array2<f64>,
    /// 1-based class labels, one per sample
    pub y: Array1<i64>,
}

impl LabeledDataset {
    pub fn new(x: Array2<f64>, y: Array1<i64>) -> Result<LabeledDataset> {
        if x.ncols() != y.len() {
            return Err(Error::SampleCountMismatch {
                features: x.ncols(),
                targets: y.len(),
            });
        }

        Ok(LabeledDataset { x, y })
    }

    pub fn num_samples(&self) -> usize {
        self.y.len()
    }

    pub fn num_features(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }
}

/// A train/test pair
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataSplit {
    pub train: LabeledDataset,
    pub test: LabeledDataset,
}

/// A stationary split and a distribution-shifted one, used for the two-stage run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MoverSplit {
    #[serde(rename = "static")]
    pub stationary: DataSplit,
    pub mover: DataSplit,
}
