use crate::error::{Error, Result};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Sample-major features and 0-based targets, iterated in fixed-size chunks.
/// The last chunk may be short. Order is kept as given
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedDataset {
    features: Array2<f64>,
    targets: Array1<i64>,
    batch_size: usize,
}

impl BatchedDataset {
    pub fn new(features: Array2<f64>, targets: Array1<i64>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }
        if features.nrows() != targets.len() {
            return Err(Error::SampleCountMismatch {
                features: features.nrows(),
                targets: targets.len(),
            });
        }

        Ok(BatchedDataset {
            features,
            targets,
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_samples(&self) -> usize {
        self.targets.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Number of batches
    pub fn len(&self) -> usize {
        self.num_samples().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn targets(&self) -> ArrayView1<'_, i64> {
        self.targets.view()
    }

    /// Iterate over (features, targets) batches in order
    pub fn iter(&self) -> impl Iterator<Item = (ArrayView2<'_, f64>, ArrayView1<'_, i64>)> + '_ {
        self.features
            .axis_chunks_iter(Axis(0), self.batch_size)
            .zip(self.targets.axis_chunks_iter(Axis(0), self.batch_size))
    }

    /// The samples of `self` followed by those of `other`, batched with
    /// `self`'s batch size. An empty side contributes nothing, whatever its width
    pub fn concatenate(&self, other: &BatchedDataset) -> Result<BatchedDataset> {
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return BatchedDataset::new(
                other.features.clone(),
                other.targets.clone(),
                self.batch_size,
            );
        }
        if self.num_features() != other.num_features() {
            return Err(Error::FeatureWidthMismatch {
                expected: self.num_features(),
                found: other.num_features(),
            });
        }

        let features = concatenate(Axis(0), &[self.features.view(), other.features.view()])?;
        let targets = concatenate(Axis(0), &[self.targets.view(), other.targets.view()])?;

        BatchedDataset::new(features, targets, self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};
    use proptest::prelude::*;

    fn dataset(n: usize, batch_size: usize) -> BatchedDataset {
        let features = Array::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f64);
        let targets = Array::from_shape_fn(n, |i| (i % 4) as i64);

        BatchedDataset::new(features, targets, batch_size).unwrap()
    }

    #[test]
    fn last_batch_is_short() {
        let data = dataset(25, 10);
        let sizes: Vec<usize> = data.iter().map(|(x, y)| {
            assert_eq!(x.nrows(), y.len());
            y.len()
        }).collect();

        assert_eq!(data.len(), 3);
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn empty_dataset_has_no_batches() {
        let data = BatchedDataset::new(Array2::zeros((0, 0)), Array1::zeros(0), 10).unwrap();

        assert_eq!(data.len(), 0);
        assert!(data.is_empty());
        assert_eq!(data.iter().count(), 0);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let result = BatchedDataset::new(Array2::zeros((3, 2)), array![0, 1], 10);

        assert!(matches!(
            result,
            Err(Error::SampleCountMismatch { features: 3, targets: 2 })
        ));
    }

    #[test]
    fn concatenate_keeps_order() {
        let first = dataset(4, 10);
        let second = BatchedDataset::new(array![[-1.0, -2.0, -3.0]], array![3], 2).unwrap();
        let combined = first.concatenate(&second).unwrap();

        assert_eq!(combined.num_samples(), 5);
        assert_eq!(combined.batch_size(), 10);
        assert_eq!(combined.targets().to_vec(), vec![0, 1, 2, 3, 3]);
        assert_eq!(combined.features().row(4).to_vec(), vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn concatenate_with_empty_side_ignores_its_width() {
        let data = dataset(7, 10);
        let empty = BatchedDataset::new(Array2::zeros((0, 0)), Array1::zeros(0), 5).unwrap();

        assert_eq!(data.concatenate(&empty).unwrap(), data);

        let swapped = empty.concatenate(&data).unwrap();
        assert_eq!(swapped.features(), data.features());
        assert_eq!(swapped.batch_size(), 5);
    }

    #[test]
    fn concatenate_rejects_different_widths() {
        let data = dataset(2, 10);
        let narrow = BatchedDataset::new(array![[1.0]], array![0], 10).unwrap();

        assert!(matches!(
            data.concatenate(&narrow),
            Err(Error::FeatureWidthMismatch { expected: 3, found: 1 })
        ));
    }

    proptest! {
        #[test]
        fn batches_rebuild_the_sequence(n in 0usize..120, batch_size in 1usize..17) {
            let data = dataset(n, batch_size);
            let batches: Vec<_> = data.iter().collect();

            prop_assert_eq!(batches.len(), (n + batch_size - 1) / batch_size);
            for (idx, (x, _)) in batches.iter().enumerate() {
                if idx + 1 < batches.len() {
                    prop_assert_eq!(x.nrows(), batch_size);
                } else {
                    prop_assert!(x.nrows() >= 1 && x.nrows() <= batch_size);
                }
            }

            let feature_views: Vec<_> = batches.iter().map(|(x, _)| *x).collect();
            let target_views: Vec<_> = batches.iter().map(|(_, y)| *y).collect();
            if !batches.is_empty() {
                prop_assert_eq!(concatenate(Axis(0), &feature_views).unwrap(), data.features());
                prop_assert_eq!(concatenate(Axis(0), &target_views).unwrap(), data.targets());
            }
        }
    }
}
