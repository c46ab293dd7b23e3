use ndarray::{ArrayView1, ArrayView2, Axis};
use std::fmt;

/// Result of one evaluation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub loss: f64,
    pub accuracy: f64,
    /// Always equal to `accuracy`: with integer labels both metrics are the
    /// fraction of samples whose largest logit is the label
    pub sparse_categorical_accuracy: f64,
}

impl Metrics {
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.loss, self.accuracy, self.sparse_categorical_accuracy)
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loss {}, Accuracy {}, SC Accuracy {}",
            self.loss, self.accuracy, self.sparse_categorical_accuracy
        )
    }
}

/// Mean loss and accuracy over one training epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
}

/// Sample-weighted running averages over a sequence of batches
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricTracker {
    weighted_loss: f64,
    correct: usize,
    seen: usize,
}

impl MetricTracker {
    pub fn update(&mut self, batch_loss: f64, correct: usize, batch_len: usize) {
        self.weighted_loss += batch_loss * batch_len as f64;
        self.correct += correct;
        self.seen += batch_len;
    }

    /// NaN until a sample has been seen
    pub fn loss(&self) -> f64 {
        self.weighted_loss / self.seen as f64
    }

    pub fn accuracy(&self) -> f64 {
        self.correct as f64 / self.seen as f64
    }

    pub fn metrics(&self) -> Metrics {
        let accuracy = self.accuracy();

        Metrics {
            loss: self.loss(),
            accuracy,
            sparse_categorical_accuracy: accuracy,
        }
    }
}

/// Index of the largest score; ties go to the lowest index
pub fn argmax(scores: ArrayView1<f64>) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (idx, score)| {
            if *score > best.1 {
                (idx, *score)
            } else {
                best
            }
        })
        .0
}

/// Number of rows whose largest logit sits at the label's index
pub fn count_correct(logits: &ArrayView2<f64>, targets: &ArrayView1<i64>) -> usize {
    logits
        .axis_iter(Axis(0))
        .zip(targets.iter())
        .filter(|(row, label)| i64::try_from(argmax(row.view())).ok() == Some(**label))
        .count()
}
