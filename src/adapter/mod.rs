//! Conversion from the upstream dataset convention to the one the harness trains on.
//!
//! Upstream features are feature-dimension-major with 1-based labels; the
//! harness wants one sample per row and labels that index output units
//! directly.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::Result;
use crate::parsing::LabeledDataset;

pub mod batched;

pub use batched::BatchedDataset;

/// Transpose a (features, samples) array into (samples, features)
pub fn to_sample_major(features: ArrayView2<f64>) -> Array2<f64> {
    features.t().as_standard_layout().into_owned()
}

/// Shift 1-based labels down by one.
/// Labels are not checked here; anything outside `1..=K` comes out negative
/// or too large and is only caught when the loss indexes the logits
pub fn to_zero_based(targets: ArrayView1<i64>) -> Array1<i64> {
    targets.mapv(|label| label - 1)
}

pub fn adapt(dataset: &LabeledDataset) -> (Array2<f64>, Array1<i64>) {
    (
        to_sample_major(dataset.x.view()),
        to_zero_based(dataset.y.view()),
    )
}

/// Adapt a dataset and group it into sequential chunks of `batch_size`
pub fn batch(dataset: &LabeledDataset, batch_size: usize) -> Result<BatchedDataset> {
    let (features, targets) = adapt(dataset);

    BatchedDataset::new(features, targets, batch_size)
}
