use crate::adapter::BatchedDataset;
use crate::config::Verbosity;
use crate::error::{Error, Result};
use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::Deserialize;
use tracing::info;

use super::loss::{softmax, sparse_categorical_crossentropy, sparse_categorical_crossentropy_grad};
use super::metrics::{count_correct, EpochSummary, MetricTracker, Metrics};
use super::optimizer::RmsProp;
use super::Model;

/// Represents a neural net: dense layers with an activation on every hidden
/// layer and raw logits out of the last one
pub struct NeuralNet {
    pub layers: Vec<(Array2<f64>, Array1<f64>)>, // Each layer holds a weight matrix and a bias vector
    pub activation_function: ActivationFunction,
    optimizer: RmsProp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum ActivationFunction {
    #[default]
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "sigmoid")]
    Sigmoid,
    #[serde(rename = "tanh")]
    Tanh,
    #[serde(rename = "leaky_relu")]
    LeakyReLU,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    /// Weights from U(-0.3, 0.3), biases set to one
    Uniform,
    /// Glorot-uniform weights, zero biases
    #[default]
    Xavier,
}

impl NeuralNet {
    /// Construct a new neural net according to the specified layer sizes
    pub fn new<R: Rng + ?Sized>(
        layer_structure: &[usize],
        activation_function: ActivationFunction,
        init_method: InitMethod,
        optimizer: RmsProp,
        rng: &mut R,
    ) -> Result<NeuralNet> {
        if layer_structure.len() < 2 || layer_structure.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "cannot build a network with layer sizes {:?}",
                layer_structure
            )));
        }
        // ndarray panics on shapes whose element count overflows isize
        let max_elements = isize::MAX as usize / std::mem::size_of::<f64>();
        for pair in layer_structure.windows(2) {
            if pair[0].checked_mul(pair[1]).map_or(true, |n| n > max_elements) {
                return Err(Error::InvalidConfig(format!(
                    "a {}x{} weight matrix is too large",
                    pair[0], pair[1]
                )));
            }
        }

        let layers = match init_method {
            InitMethod::Uniform => init_layers_uniform(layer_structure, rng),
            InitMethod::Xavier => init_layers_xavier(layer_structure, rng),
        };

        Ok(NeuralNet {
            layers,
            activation_function,
            optimizer,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].0.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].1.len()
    }

    // Perform a forward pass of the network on some input.
    // Returns the outputs of every layer (starting with the input itself), and
    // the non-activated outputs (used for backprop)
    fn forward(&self, inputs: &ArrayView2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut hidden = vec![inputs.to_owned()];
        let mut hidden_linear = vec![];
        let last = self.layers.len() - 1;

        for (idx, (weights, bias)) in self.layers.iter().enumerate() {
            let lin_output = hidden[idx].dot(weights) + bias;
            // The output layer has no activation: it produces logits
            let real_output = if idx == last {
                lin_output.clone()
            } else {
                lin_output.mapv(|x| activation(self.activation_function, x))
            };

            hidden.push(real_output);
            hidden_linear.push(lin_output);
        }

        (hidden, hidden_linear)
    }

    /// Raw output scores for a batch of samples
    pub fn logits(&self, inputs: &ArrayView2<f64>) -> Array2<f64> {
        let (mut hidden, _) = self.forward(inputs);

        hidden.swap_remove(self.layers.len())
    }

    /// Calculate the gradients WRT every layer using backprop.
    /// `grad` is the gradient of the loss WRT the logits
    fn backward(
        &self,
        hidden: &[Array2<f64>],
        hidden_linear: &[Array2<f64>],
        grad: Array2<f64>,
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let mut grads = Vec::with_capacity(self.layers.len());
        // The gradient WRT the current layer
        let mut grad_help = grad;

        for idx in (0..self.layers.len()).rev() {
            // Hidden layers pass the gradient through their activation
            if idx != self.layers.len() - 1 {
                let step_mat =
                    hidden_linear[idx].mapv(|x| delta_activation(self.activation_function, x));
                grad_help = grad_help * step_mat;
            }

            let weight_grad = hidden[idx].t().dot(&grad_help);
            let bias_grad = grad_help.sum_axis(Axis(0));
            let next = grad_help.dot(&self.layers[idx].0.t());

            grads.push((weight_grad, bias_grad));
            grad_help = next;
        }

        grads.reverse();
        grads
    }

    /// One optimizer step on a batch. Returns the batch loss (before the
    /// update) and the number of correctly classified samples
    fn train_step(
        &mut self,
        inputs: &ArrayView2<f64>,
        targets: &ArrayView1<i64>,
    ) -> Result<(f64, usize)> {
        let (hidden, hidden_linear) = self.forward(inputs);
        let logits = hidden[self.layers.len()].view();

        let loss = sparse_categorical_crossentropy(&logits, targets)?;
        let correct = count_correct(&logits, targets);
        let grad = sparse_categorical_crossentropy_grad(&logits, targets);

        let grads = self.backward(&hidden, &hidden_linear, grad);
        self.optimizer.step(&mut self.layers, &grads);

        Ok((loss, correct))
    }

    fn check_width(&self, dataset: &BatchedDataset) -> Result<()> {
        if !dataset.is_empty() && dataset.num_features() != self.input_dim() {
            return Err(Error::FeatureWidthMismatch {
                expected: self.input_dim(),
                found: dataset.num_features(),
            });
        }

        Ok(())
    }
}

impl Model for NeuralNet {
    /// Sweep the batches `epochs` times, one optimizer step per batch.
    /// Returns the mean loss and accuracy of every epoch
    fn fit(
        &mut self,
        dataset: &BatchedDataset,
        epochs: usize,
        verbose: Verbosity,
    ) -> Result<Vec<EpochSummary>> {
        self.check_width(dataset)?;
        let mut history = Vec::with_capacity(epochs);

        for epoch in 1..=epochs {
            let mut tracker = MetricTracker::default();

            for (step, (input_batch, target_batch)) in dataset.iter().enumerate() {
                let (loss, correct) = self.train_step(&input_batch, &target_batch)?;
                tracker.update(loss, correct, target_batch.len());

                if verbose == Verbosity::Progress {
                    info!(
                        epoch,
                        step = step + 1,
                        steps = dataset.len(),
                        loss = tracker.loss(),
                        accuracy = tracker.accuracy(),
                        "train step"
                    );
                }
            }

            let summary = EpochSummary {
                epoch,
                loss: tracker.loss(),
                accuracy: tracker.accuracy(),
            };
            if verbose != Verbosity::Silent {
                info!(
                    epoch,
                    epochs,
                    loss = summary.loss,
                    accuracy = summary.accuracy,
                    "epoch done"
                );
            }
            history.push(summary);
        }

        Ok(history)
    }

    /// Forward pass over every batch, no updates
    fn evaluate(&self, dataset: &BatchedDataset, verbose: Verbosity) -> Result<Metrics> {
        self.check_width(dataset)?;
        let mut tracker = MetricTracker::default();

        for (input_batch, target_batch) in dataset.iter() {
            let logits = self.logits(&input_batch);
            let loss = sparse_categorical_crossentropy(&logits.view(), &target_batch)?;
            tracker.update(loss, count_correct(&logits.view(), &target_batch), target_batch.len());
        }

        let metrics = tracker.metrics();
        if verbose != Verbosity::Silent {
            info!(
                samples = dataset.num_samples(),
                batches = dataset.len(),
                loss = metrics.loss,
                accuracy = metrics.accuracy,
                "evaluation done"
            );
        }

        Ok(metrics)
    }

    /// Predict the probabities for a set of instances - each instance is a row in "inputs"
    fn predict(&self, inputs: &ArrayView2<f64>) -> Array2<f64> {
        let mut predictions = self.logits(inputs);

        for mut row in predictions.axis_iter_mut(Axis(0)) {
            let probs = softmax(row.view());
            row.assign(&probs);
        }

        predictions
    }
}

fn activation(name: ActivationFunction, z: f64) -> f64 {
    match name {
        ActivationFunction::ReLU => z.max(0f64),
        ActivationFunction::Sigmoid => (1f64 + (-z).exp()).recip(),
        ActivationFunction::Tanh => z.tanh(),
        ActivationFunction::LeakyReLU => z.max(0.01 * z),
    }
}

fn delta_activation(name: ActivationFunction, z: f64) -> f64 {
    match name {
        ActivationFunction::ReLU => {
            if z > 0f64 {
                1f64
            } else {
                0f64
            }
        }
        ActivationFunction::Sigmoid => activation(name, z) * (1f64 - activation(name, z)),
        ActivationFunction::Tanh => 1f64 - activation(name, z) * activation(name, z),
        ActivationFunction::LeakyReLU => {
            if z > 0f64 {
                1f64
            } else {
                0.01f64
            }
        }
    }
}

fn init_layers_uniform<R: Rng + ?Sized>(
    layer_structure: &[usize],
    rng: &mut R,
) -> Vec<(Array2<f64>, Array1<f64>)> {
    let mut layers = vec![];
    let distribution = Uniform::new(-0.3, 0.3);

    for pair in layer_structure.windows(2) {
        // Random matrix of the weights between this layer and the next layer
        let weights =
            Array::zeros((pair[0], pair[1])).map(|_: &f64| distribution.sample(&mut *rng));
        let bias = Array::ones(pair[1]);

        layers.push((weights, bias));
    }

    layers
}

fn init_layers_xavier<R: Rng + ?Sized>(
    layer_structure: &[usize],
    rng: &mut R,
) -> Vec<(Array2<f64>, Array1<f64>)> {
    let mut layers = vec![];

    for pair in layer_structure.windows(2) {
        let boundary = (6f64 / (pair[0] + pair[1]) as f64).sqrt();
        let dist = Uniform::new_inclusive(-boundary, boundary);

        let weights = Array::zeros((pair[0], pair[1])).map(|_: &f64| dist.sample(&mut *rng));
        let bias = Array::zeros(pair[1]);

        layers.push((weights, bias));
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::optimizer::RmsPropConfig;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    fn net(layer_structure: &[usize], seed: u64) -> NeuralNet {
        let mut rng = StdRng::seed_from_u64(seed);
        NeuralNet::new(
            layer_structure,
            ActivationFunction::ReLU,
            InitMethod::Xavier,
            RmsPropConfig::default().init(),
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn xavier_layers_have_the_requested_shapes() {
        let model = net(&[2, 4, 3], 1);
        let boundary = (6f64 / 6f64).sqrt();

        assert_eq!(model.layers.len(), 2);
        assert_eq!(model.layers[0].0.shape(), &[2, 4]);
        assert_eq!(model.layers[1].0.shape(), &[4, 3]);
        assert!(model.layers[0].0.iter().all(|w| w.abs() <= boundary));
        assert!(model.layers.iter().all(|(_, b)| b.iter().all(|v| *v == 0f64)));
        assert_eq!(model.input_dim(), 2);
        assert_eq!(model.num_classes(), 3);
    }

    #[test]
    fn same_seed_same_weights() {
        assert_eq!(net(&[3, 4, 2], 9).layers, net(&[3, 4, 2], 9).layers);
    }

    #[test]
    fn rejects_degenerate_structures() {
        let mut rng = StdRng::seed_from_u64(0);
        let optimizer = RmsPropConfig::default().init();

        assert!(NeuralNet::new(&[3], ActivationFunction::ReLU, InitMethod::Xavier, optimizer.clone(), &mut rng).is_err());
        assert!(NeuralNet::new(&[0, 4, 2], ActivationFunction::ReLU, InitMethod::Xavier, optimizer, &mut rng).is_err());
    }

    #[test]
    fn rejects_layers_too_large_to_allocate() {
        let mut rng = StdRng::seed_from_u64(0);
        let optimizer = RmsPropConfig::default().init();

        assert!(matches!(
            NeuralNet::new(&[2, 4, usize::MAX], ActivationFunction::ReLU, InitMethod::Xavier, optimizer.clone(), &mut rng),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            NeuralNet::new(&[usize::MAX / 2, 4, 2], ActivationFunction::ReLU, InitMethod::Uniform, optimizer, &mut rng),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn output_layer_is_linear() {
        let mut model = net(&[1, 1, 1], 0);
        model.layers = vec![(array![[1.0]], array![0.0]), (array![[-2.0]], array![-1.0])];

        // relu(3) * -2 - 1, no activation on the way out
        assert_eq!(model.logits(&array![[3.0]].view()), array![[-7.0]]);
        // relu(-3) = 0
        assert_eq!(model.logits(&array![[-3.0]].view()), array![[-1.0]]);
    }

    #[test]
    fn weight_gradients_match_finite_differences() {
        let model = net(&[2, 4, 3], 5);
        let inputs = array![[0.5, -1.0], [1.5, 2.0], [-0.7, 0.2]];
        let targets = array![0, 2, 1];

        let (hidden, hidden_linear) = model.forward(&inputs.view());
        let logits = hidden[2].view();
        let grad = sparse_categorical_crossentropy_grad(&logits, &targets.view());
        let grads = model.backward(&hidden, &hidden_linear, grad);

        let loss_with = |layers: Vec<(Array2<f64>, Array1<f64>)>| {
            let mut perturbed = net(&[2, 4, 3], 5);
            perturbed.layers = layers;
            let logits = perturbed.logits(&inputs.view());
            sparse_categorical_crossentropy(&logits.view(), &targets.view()).unwrap()
        };

        let eps = 1e-6;
        for layer in 0..2 {
            for ((i, j), analytic) in grads[layer].0.indexed_iter() {
                let mut plus = model.layers.clone();
                let mut minus = model.layers.clone();
                plus[layer].0[[i, j]] += eps;
                minus[layer].0[[i, j]] -= eps;

                let numeric = (loss_with(plus) - loss_with(minus)) / (2.0 * eps);
                assert!((numeric - analytic).abs() < 1e-5, "layer {} ({}, {})", layer, i, j);
            }
        }
    }

    #[test]
    fn fresh_model_evaluates_to_sane_numbers() {
        let model = net(&[2, 4, 2], 11);
        let data = BatchedDataset::new(
            array![[0.1, 0.2], [3.0, -1.0], [-2.0, 0.5]],
            array![0, 1, 1],
            2,
        )
        .unwrap();

        let metrics = model.evaluate(&data, Verbosity::Silent).unwrap();

        assert!(metrics.loss.is_finite());
        assert!((0f64..=1f64).contains(&metrics.accuracy));
        assert_eq!(metrics.accuracy, metrics.sparse_categorical_accuracy);
    }

    #[test]
    fn fit_records_every_epoch() {
        let mut model = net(&[1, 4, 2], 2);
        let data = BatchedDataset::new(array![[-1.0], [1.0], [-2.0], [2.0]], array![0, 1, 0, 1], 3).unwrap();

        let history = model.fit(&data, 5, Verbosity::Silent).unwrap();

        assert_eq!(history.len(), 5);
        assert_eq!(history.iter().map(|s| s.epoch).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(history.iter().all(|s| s.loss.is_finite()));
    }

    #[test]
    fn per_batch_logging_does_not_change_training() {
        let data = BatchedDataset::new(array![[-1.0], [1.0], [-2.0], [2.0], [0.5]], array![0, 1, 0, 1, 1], 2).unwrap();
        let mut quiet = net(&[1, 4, 2], 6);
        let mut chatty = net(&[1, 4, 2], 6);

        let silent_history = quiet.fit(&data, 3, Verbosity::Silent).unwrap();
        let progress_history = chatty.fit(&data, 3, Verbosity::Progress).unwrap();

        assert_eq!(progress_history, silent_history);
        assert_eq!(chatty.layers, quiet.layers);
    }

    #[test]
    fn fit_surfaces_bad_labels() {
        let mut model = net(&[1, 4, 2], 2);
        let data = BatchedDataset::new(array![[0.0], [1.0]], array![0, 2], 10).unwrap();

        assert!(matches!(
            model.fit(&data, 1, Verbosity::Silent),
            Err(Error::LabelOutOfRange { label: 2, num_classes: 2 })
        ));
    }

    #[test]
    fn rejects_wrong_feature_width() {
        let model = net(&[2, 4, 2], 2);
        let data = BatchedDataset::new(array![[0.0, 1.0, 2.0]], array![0], 10).unwrap();

        assert!(matches!(
            model.evaluate(&data, Verbosity::Silent),
            Err(Error::FeatureWidthMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn predictions_are_distributions() {
        let model = net(&[2, 4, 3], 4);
        let probs = model.predict(&array![[1.0, 2.0], [-3.0, 0.5]].view());

        assert_eq!(probs.shape(), &[2, 3]);
        for row in probs.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }
}
