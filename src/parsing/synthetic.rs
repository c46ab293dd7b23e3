use super::{DataSplit, LabeledDataset, MoverSplit};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Place `num_classes` cluster centres evenly on a circle around the origin.
/// Rows are classes, columns are the two coordinates
pub fn circle_centers(num_classes: usize, radius: f64) -> Array2<f64> {
    Array2::from_shape_fn((num_classes, 2), |(class, coord)| {
        let angle = PI / 4f64 + 2f64 * PI * class as f64 / num_classes as f64;
        match coord {
            0 => radius * angle.cos(),
            _ => radius * angle.sin(),
        }
    })
}

/// Sample `samples_per_class` points around every centre, in the upstream
/// layout: feature-dimension-major with 1-based labels.
/// Classes are interleaved so that sequential batches mix them
pub fn gaussian_clusters<R: Rng + ?Sized>(
    centers: ArrayView2<f64>,
    std_dev: f64,
    samples_per_class: usize,
    rng: &mut R,
) -> Result<LabeledDataset> {
    if std_dev.is_nan() || std_dev < 0f64 {
        return Err(Error::InvalidConfig(format!(
            "cluster spread must be non-negative, got {}",
            std_dev
        )));
    }
    let noise = Normal::new(0f64, std_dev)
        .map_err(|e| Error::InvalidConfig(format!("cluster spread {}: {}", std_dev, e)))?;
    let num_classes = centers.nrows();
    let num_samples = num_classes * samples_per_class;

    let mut x = Array2::zeros((centers.ncols(), num_samples));
    let mut y = Array1::zeros(num_samples);

    for i in 0..samples_per_class {
        for (class, center) in centers.outer_iter().enumerate() {
            let sample = i * num_classes + class;

            for (dim, c) in center.iter().enumerate() {
                x[[dim, sample]] = c + noise.sample(rng);
            }
            y[sample] = class as i64 + 1;
        }
    }

    LabeledDataset::new(x, y)
}

pub fn data_split<R: Rng + ?Sized>(
    centers: ArrayView2<f64>,
    std_dev: f64,
    train_per_class: usize,
    test_per_class: usize,
    rng: &mut R,
) -> Result<DataSplit> {
    Ok(DataSplit {
        train: gaussian_clusters(centers, std_dev, train_per_class, rng)?,
        test: gaussian_clusters(centers, std_dev, test_per_class, rng)?,
    })
}

/// Same clusters twice: once in place, once with every centre moved by `shift`
/// along each axis
pub fn mover_split<R: Rng + ?Sized>(
    centers: ArrayView2<f64>,
    shift: f64,
    std_dev: f64,
    train_per_class: usize,
    test_per_class: usize,
    rng: &mut R,
) -> Result<MoverSplit> {
    let shifted = centers.mapv(|c| c + shift);

    Ok(MoverSplit {
        stationary: data_split(centers, std_dev, train_per_class, test_per_class, rng)?,
        mover: data_split(shifted.view(), std_dev, train_per_class, test_per_class, rng)?,
    })
}
