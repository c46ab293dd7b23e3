//! Train/test driver: adapt the upstream splits, build the classifier, fit it,
//! evaluate it and report the metrics.

use crate::adapter::{adapt, batch, BatchedDataset};
use crate::config::{HarnessConfig, Verbosity};
use crate::error::{Error, Result};
use crate::history::{tag, HistoryRecord, Stage};
use crate::model::{EpochSummary, Metrics, Model, NeuralNet};
use crate::parsing::{DataSplit, LabeledDataset, MoverSplit};
use tracing::debug;

/// Outcome of a single train/test run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub metrics: Metrics,
    pub history: Vec<HistoryRecord>,
}

/// Outcome of a two-stage run
#[derive(Debug, Clone, PartialEq)]
pub struct TwoStageReport {
    /// Static test split, after training on the static split
    pub pre_shift: Metrics,
    /// Mover test split, after continuing on the mover split
    pub post_shift: Metrics,
    /// Mover and static test splits together, after both stages
    pub combined: Metrics,
    pub history: Vec<HistoryRecord>,
}

pub fn print_loaded() {
    println!("The mlp harness is loaded, and functions can be run in it.");
    debug!(version = env!("CARGO_PKG_VERSION"), "harness loaded");
}

/// The shapes the training set takes once adapted
pub fn data_shape(split: &DataSplit) -> String {
    let (features, labels) = adapt(&split.train);

    format!(
        "Features:\n{:?}\nLabels:\n{:?}",
        features.shape(),
        labels.shape()
    )
}

pub fn show_data_shape(split: &DataSplit) {
    println!("{}", data_shape(split));
}

/// Adapt and batch both halves of a split
pub fn get_datasets(split: &DataSplit, batch_size: usize) -> Result<(BatchedDataset, BatchedDataset)> {
    show_data_shape(split);

    Ok((batch(&split.train, batch_size)?, batch(&split.test, batch_size)?))
}

/// Output width needed for the given (1-based) datasets: their largest label
pub fn num_classes<'a, I>(datasets: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a LabeledDataset>,
{
    let largest = datasets
        .into_iter()
        .flat_map(|dataset| dataset.y.iter().copied())
        .max();

    match largest {
        Some(label) if label > 0 => usize::try_from(label)
            .map_err(|_| Error::InvalidConfig(format!("label {} is too large for this platform", label))),
        _ => Err(Error::NoLabels),
    }
}

/// Feature width of the first dataset that has samples
fn input_width(datasets: &[&BatchedDataset]) -> usize {
    datasets
        .iter()
        .find(|dataset| !dataset.is_empty())
        .map_or(0, |dataset| dataset.num_features())
}

/// A fresh classifier: one hidden layer, `num_classes` logits out, RMSprop
pub fn build_model(input_dim: usize, num_classes: usize, config: &HarnessConfig) -> Result<NeuralNet> {
    let mut rng = config.rng();
    let layer_structure = [input_dim, config.model.hidden_units, num_classes];
    debug!(?layer_structure, "building model");

    NeuralNet::new(
        &layer_structure,
        config.model.hidden_activation,
        config.model.init_method,
        config.optimizer.init(),
        &mut rng,
    )
}

pub fn train(
    model: &mut NeuralNet,
    train_dataset: &BatchedDataset,
    epochs: usize,
    verbose: Verbosity,
) -> Result<Vec<EpochSummary>> {
    model.fit(train_dataset, epochs, verbose)
}

pub fn stdout_metrics(metrics: &Metrics) {
    println!("{}", metrics);
}

/// Evaluate without updating and print the summary line
pub fn evaluate(model: &NeuralNet, test_dataset: &BatchedDataset, verbose: Verbosity) -> Result<Metrics> {
    let metrics = model.evaluate(test_dataset, verbose)?;
    stdout_metrics(&metrics);

    Ok(metrics)
}

/// Train once on `split.train` and evaluate once on `split.test`
pub fn run(split: &DataSplit, config: &HarnessConfig) -> Result<RunReport> {
    config.validate()?;

    let (train_dataset, test_dataset) = get_datasets(split, config.batch_size)?;
    let num_classes = num_classes([&split.test])?;
    let mut model = build_model(
        input_width(&[&train_dataset, &test_dataset]),
        num_classes,
        config,
    )?;

    let history = train(&mut model, &train_dataset, config.epochs, config.verbose)?;
    let metrics = evaluate(&model, &test_dataset, config.verbose)?;

    Ok(RunReport {
        metrics,
        history: tag(Stage::Train, history),
    })
}

/// Train on the static split, then keep training the same model on the mover
/// split, evaluating after each stage and once more on both test sets
pub fn run_two_stage(split: &MoverSplit, config: &HarnessConfig) -> Result<TwoStageReport> {
    config.validate()?;

    let (train_static, test_static) = get_datasets(&split.stationary, config.batch_size)?;
    let (train_mover, test_mover) = get_datasets(&split.mover, config.batch_size)?;
    let num_classes = num_classes([&split.stationary.test, &split.mover.test])?;
    let input_dim = input_width(&[&train_static, &test_static, &train_mover, &test_mover]);
    let mut model = build_model(input_dim, num_classes, config)?;

    let mut history = tag(
        Stage::Static,
        train(&mut model, &train_static, config.epochs, config.verbose)?,
    );
    let pre_shift = evaluate(&model, &test_static, config.verbose)?;

    history.extend(tag(
        Stage::Mover,
        train(&mut model, &train_mover, config.epochs, config.verbose)?,
    ));
    let post_shift = evaluate(&model, &test_mover, config.verbose)?;

    let test_combined = test_mover.concatenate(&test_static)?;
    let combined = evaluate(&model, &test_combined, config.verbose)?;

    Ok(TwoStageReport {
        pre_shift,
        post_shift,
        combined,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::synthetic::{data_split, mover_split};
    use ndarray::{array, Array1, Array2};
    use rand::{rngs::StdRng, SeedableRng};

    fn quiet(seed: u64) -> HarnessConfig {
        HarnessConfig {
            verbose: Verbosity::Silent,
            seed: Some(seed),
            ..HarnessConfig::default()
        }
    }

    fn clusters(seed: u64) -> DataSplit {
        let mut rng = StdRng::seed_from_u64(seed);
        let centers = array![[-2.0, -2.0], [2.0, 2.0]];

        data_split(centers.view(), 0.5, 100, 100, &mut rng).unwrap()
    }

    fn empty_split(num_features: usize) -> DataSplit {
        let empty = LabeledDataset::new(Array2::zeros((num_features, 0)), Array1::zeros(0)).unwrap();

        DataSplit {
            train: empty.clone(),
            test: empty,
        }
    }

    #[test]
    fn separable_clusters_are_learned() {
        let report = run(&clusters(17), &quiet(3)).unwrap();

        assert_eq!(report.history.len(), 20);
        assert!(report.metrics.accuracy > 0.9, "accuracy {}", report.metrics.accuracy);
        assert!(report.metrics.loss < report.history[0].loss);
    }

    #[test]
    fn empty_mover_matches_single_run() {
        let split = clusters(5);
        let config = quiet(8);

        let single = run(&split, &config).unwrap();
        let two_stage = run_two_stage(
            &MoverSplit {
                stationary: split.clone(),
                mover: empty_split(0),
            },
            &config,
        )
        .unwrap();

        assert_eq!(two_stage.pre_shift, single.metrics);
        assert!(two_stage.post_shift.loss.is_nan());
        assert_eq!(two_stage.combined, single.metrics);
        assert_eq!(two_stage.history.len(), 40);
        assert!(two_stage.history[..20].iter().all(|r| r.stage == Stage::Static));
    }

    #[test]
    fn two_stage_reports_three_triples() {
        let mut rng = StdRng::seed_from_u64(21);
        let centers = array![[-2.0, -2.0], [2.0, 2.0], [2.0, -2.0]];
        let split = mover_split(centers.view(), 1.0, 0.4, 30, 10, &mut rng).unwrap();
        let config = HarnessConfig {
            epochs: 3,
            ..quiet(1)
        };

        let report = run_two_stage(&split, &config).unwrap();

        for metrics in [report.pre_shift, report.post_shift, report.combined] {
            assert!(metrics.loss.is_finite());
            assert!((0f64..=1f64).contains(&metrics.accuracy));
        }
        assert_eq!(report.history.len(), 6);
        assert_eq!(report.history[3].stage, Stage::Mover);
    }

    #[test]
    fn untrained_model_gives_sane_metrics() {
        let split = clusters(2);
        let test_dataset = batch(&split.test, 10).unwrap();
        let model = build_model(2, 2, &quiet(4)).unwrap();

        let metrics = evaluate(&model, &test_dataset, Verbosity::Silent).unwrap();

        assert!(metrics.loss.is_finite());
        assert!((0f64..=1f64).contains(&metrics.accuracy));
    }

    #[test]
    fn model_is_sized_by_the_test_labels() {
        let split = DataSplit {
            train: LabeledDataset::new(array![[0.0, 1.0]], array![1, 2]).unwrap(),
            test: LabeledDataset::new(array![[0.5]], array![4]).unwrap(),
        };

        assert_eq!(num_classes([&split.test]).unwrap(), 4);
        assert!(run(&split, &HarnessConfig { epochs: 1, ..quiet(0) }).is_ok());
    }

    #[test]
    fn train_labels_beyond_the_test_range_fail() {
        let split = DataSplit {
            train: LabeledDataset::new(array![[0.0, 1.0]], array![1, 3]).unwrap(),
            test: LabeledDataset::new(array![[0.5]], array![2]).unwrap(),
        };

        assert!(matches!(
            run(&split, &quiet(0)),
            Err(Error::LabelOutOfRange { label: 2, num_classes: 2 })
        ));
    }

    #[test]
    fn zero_labels_surface_as_loss_errors() {
        let split = DataSplit {
            train: LabeledDataset::new(array![[0.0, 1.0]], array![0, 1]).unwrap(),
            test: LabeledDataset::new(array![[0.5]], array![1]).unwrap(),
        };

        assert!(matches!(
            run(&split, &quiet(0)),
            Err(Error::LabelOutOfRange { label: -1, .. })
        ));
    }

    #[test]
    fn shapes_are_reported_sample_major() {
        let split = clusters(9);

        assert_eq!(data_shape(&split), "Features:\n[200, 2]\nLabels:\n[200]");
        assert_eq!(data_shape(&empty_split(3)), "Features:\n[0, 3]\nLabels:\n[0]");
    }

    #[test]
    fn huge_labels_are_rejected_instead_of_allocated() {
        let split = DataSplit {
            train: LabeledDataset::new(array![[0.0, 1.0]], array![1, 2]).unwrap(),
            test: LabeledDataset::new(array![[0.5]], array![i64::MAX]).unwrap(),
        };

        assert!(matches!(run(&split, &quiet(0)), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn no_test_labels_is_an_error() {
        assert!(matches!(run(&empty_split(2), &quiet(0)), Err(Error::NoLabels)));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = HarnessConfig {
            batch_size: 0,
            ..quiet(0)
        };

        assert!(matches!(run(&clusters(1), &config), Err(Error::InvalidConfig(_))));
    }
}
