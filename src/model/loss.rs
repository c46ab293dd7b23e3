use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Softmax function - Convert scores into a probability distribution
pub fn softmax(scores: ArrayView1<f64>) -> Array1<f64> {
    // Shift by the max so that exp never overflows
    let max = scores.fold(f64::NEG_INFINITY, |acc, x| acc.max(*x));
    let shifted = scores.mapv(|x| (x - max).exp());
    let sum = shifted.sum();

    shifted / sum
}

/// ln(sum(exp(scores))), computed without overflow
fn log_sum_exp(scores: ArrayView1<f64>) -> f64 {
    let max = scores.fold(f64::NEG_INFINITY, |acc, x| acc.max(*x));

    max + scores.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}

/// Turn a 0-based label into an output index
pub fn class_index(label: i64, num_classes: usize) -> Result<usize> {
    match usize::try_from(label) {
        Ok(idx) if idx < num_classes => Ok(idx),
        _ => Err(Error::LabelOutOfRange { label, num_classes }),
    }
}

/// Mean sparse categorical cross-entropy of raw logits against 0-based labels
pub fn sparse_categorical_crossentropy(
    logits: &ArrayView2<f64>,
    targets: &ArrayView1<i64>,
) -> Result<f64> {
    if logits.nrows() == 0 {
        return Ok(0f64);
    }

    let mut total = 0f64;
    for (row, label) in logits.axis_iter(Axis(0)).zip(targets.iter()) {
        let idx = class_index(*label, row.len())?;
        total += log_sum_exp(row) - row[idx];
    }

    Ok(total / logits.nrows() as f64)
}

/// Gradient of the mean loss with respect to the logits: (softmax - one_hot) / n.
/// Labels must already have been checked by the loss
pub fn sparse_categorical_crossentropy_grad(
    logits: &ArrayView2<f64>,
    targets: &ArrayView1<i64>,
) -> Array2<f64> {
    let scale = (logits.nrows().max(1) as f64).recip();
    let mut grad = Array2::zeros(logits.raw_dim());

    for ((mut grad_row, row), label) in grad
        .axis_iter_mut(Axis(0))
        .zip(logits.axis_iter(Axis(0)))
        .zip(targets.iter())
    {
        grad_row.assign(&softmax(row));
        if let Ok(idx) = class_index(*label, row.len()) {
            grad_row[idx] -= 1f64;
        }
        grad_row *= scale;
    }

    grad
}
