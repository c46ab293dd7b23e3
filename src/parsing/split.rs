use super::LabeledDataset;
use crate::error::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Wire form of a labeled dataset: `x` is a list of feature rows, each row
/// holding one value per sample
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLabeledDataset {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<i64>,
}

impl TryFrom<RawLabeledDataset> for LabeledDataset {
    type Error = Error;

    fn try_from(raw: RawLabeledDataset) -> Result<Self> {
        let num_features = raw.x.len();
        let num_samples = raw.x.first().map_or(0, Vec::len);

        for (row, values) in raw.x.iter().enumerate() {
            if values.len() != num_samples {
                return Err(Error::RaggedFeatures {
                    row,
                    expected: num_samples,
                    found: values.len(),
                });
            }
        }

        let x = Array2::from_shape_vec(
            (num_features, num_samples),
            raw.x.into_iter().flatten().collect(),
        )?;

        LabeledDataset::new(x, Array1::from(raw.y))
    }
}

impl From<LabeledDataset> for RawLabeledDataset {
    fn from(dataset: LabeledDataset) -> Self {
        RawLabeledDataset {
            x: dataset.x.outer_iter().map(|row| row.to_vec()).collect(),
            y: dataset.y.to_vec(),
        }
    }
}

/// Read a split (or any other record) from a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);

    Ok(serde_json::from_reader(reader)?)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, value)?;

    Ok(())
}
