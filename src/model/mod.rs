use ndarray::{Array2, ArrayView2};

use crate::adapter::BatchedDataset;
use crate::config::Verbosity;
use crate::error::Result;

pub mod loss;
pub mod metrics;
pub mod neural_net;
pub mod optimizer;

pub use metrics::{EpochSummary, Metrics};
pub use neural_net::{ActivationFunction, InitMethod, NeuralNet};
pub use optimizer::{RmsProp, RmsPropConfig};

pub trait Model {
    fn fit(
        &mut self,
        dataset: &BatchedDataset,
        epochs: usize,
        verbose: Verbosity,
    ) -> Result<Vec<EpochSummary>>;
    fn evaluate(&self, dataset: &BatchedDataset, verbose: Verbosity) -> Result<Metrics>;
    fn predict(&self, inputs: &ArrayView2<f64>) -> Array2<f64>;
}
