use crate::design::SparseDesign;
use ndarray::Array1;
use thiserror::Error;

/// Row-count disagreement between a design matrix and its targets. This only
/// happens when sampling and encoding were applied to different tables.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Design matrix has {design_rows} rows but the target vector has {target_len} entries.")]
pub struct ShapeError {
    pub design_rows: usize,
    pub target_len: usize,
}

/// A design matrix and its row-aligned growth scores.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    design: SparseDesign,
    targets: Array1<f64>,
}

impl EncodedDataset {
    pub fn new(design: SparseDesign, targets: Array1<f64>) -> Result<Self, ShapeError> {
        if design.n_rows() != targets.len() {
            return Err(ShapeError {
                design_rows: design.n_rows(),
                target_len: targets.len(),
            });
        }
        Ok(Self { design, targets })
    }

    pub fn design(&self) -> &SparseDesign {
        &self.design
    }

    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.design.n_cols()
    }

    /// Rows `rows`, in that order, as a new dataset.
    pub fn select(&self, rows: &[usize]) -> EncodedDataset {
        EncodedDataset {
            design: self.design.select_rows(rows),
            targets: rows.iter().map(|&r| self.targets[r]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{CollisionPolicy, encode_pairs};
    use ndarray::array;

    #[test]
    fn mismatched_lengths_are_a_shape_error() {
        let encoded = encode_pairs(&["A", "B"], &["B", "C"], CollisionPolicy::Sum);
        let err = EncodedDataset::new(encoded.design, array![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            ShapeError {
                design_rows: 2,
                target_len: 3
            }
        );
    }

    #[test]
    fn select_keeps_rows_and_targets_aligned() {
        let encoded = encode_pairs(&["A", "B", "A"], &["B", "C", "A"], CollisionPolicy::Sum);
        let dataset = EncodedDataset::new(encoded.design, array![1.0, 2.0, 3.0]).unwrap();
        let picked = dataset.select(&[2, 1]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.targets(), &array![3.0, 2.0]);
        assert_eq!(picked.design().row(0).indices, &[0]);
        assert_eq!(picked.design().row(1).indices, &[1, 2]);
        assert_eq!(picked.n_features(), 3);
    }
}
