//! # Sparse Design Matrix
//!
//! Turns two columns of allele identifiers into a binary design matrix with one
//! row per interaction and one column per distinct allele.
//!
//! The matrix is accumulated directly in compressed-row (CSR) form. Each input
//! row contributes at most two entries, so peak memory is proportional to the
//! number of rows and never to `rows × vocabulary`.

use crate::registry::{AlleleRegistry, Vocabulary};
use serde::{Deserialize, Serialize};

/// How a row whose two alleles are identical is represented.
///
/// `Sum` accumulates both insertions at the same coordinate, as coordinate-list
/// construction does, so the single entry holds `2.0`. `Binary` keeps every
/// stored value at `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    Sum,
    Binary,
}

/// A read-only sparse matrix in compressed-row layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseDesign {
    n_cols: usize,
    /// `indptr[i]..indptr[i + 1]` is the slice of row `i`.
    indptr: Vec<usize>,
    indices: Vec<u32>,
    values: Vec<f32>,
}

/// Borrowed view of one design row; column indices are strictly increasing.
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    pub indices: &'a [u32],
    pub values: &'a [f32],
}

impl SparseRow<'_> {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices
            .iter()
            .zip(self.values.iter())
            .map(|(&c, &v)| (c as usize, v))
    }
}

impl SparseDesign {
    /// An empty matrix with a fixed column count, ready for row appends.
    pub fn with_capacity(n_cols: usize, rows: usize, nnz: usize) -> Self {
        let mut indptr = Vec::with_capacity(rows + 1);
        indptr.push(0);
        Self {
            n_cols,
            indptr,
            indices: Vec::with_capacity(nnz),
            values: Vec::with_capacity(nnz),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn row(&self, i: usize) -> SparseRow<'_> {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        SparseRow {
            indices: &self.indices[start..end],
            values: &self.values[start..end],
        }
    }

    /// Gathers the listed rows, in the listed order, into a new matrix with
    /// the same column layout.
    pub fn select_rows(&self, rows: &[usize]) -> SparseDesign {
        let nnz: usize = rows
            .iter()
            .map(|&r| self.indptr[r + 1] - self.indptr[r])
            .sum();
        let mut out = SparseDesign::with_capacity(self.n_cols, rows.len(), nnz);
        for &r in rows {
            let row = self.row(r);
            out.indices.extend_from_slice(row.indices);
            out.values.extend_from_slice(row.values);
            out.indptr.push(out.indices.len());
        }
        out
    }

    /// Expands a single row to its dense form. Used when streaming rows out to
    /// a text file; the full matrix is never densified.
    pub fn row_values_dense(&self, i: usize, buffer: &mut Vec<f32>) {
        buffer.clear();
        buffer.resize(self.n_cols, 0.0);
        for (c, v) in self.row(i).iter() {
            buffer[c] = v;
        }
    }

    /// Appends one row whose two alleles map to columns `a` and `b`.
    fn push_pair(&mut self, a: u32, b: u32, policy: CollisionPolicy) {
        if a == b {
            let value = match policy {
                CollisionPolicy::Sum => 2.0,
                CollisionPolicy::Binary => 1.0,
            };
            self.indices.push(a);
            self.values.push(value);
        } else {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            self.indices.extend_from_slice(&[lo, hi]);
            self.values.extend_from_slice(&[1.0, 1.0]);
        }
        self.indptr.push(self.indices.len());
    }
}

/// The encoder's output: a frozen column layout and the matrix built on it.
#[derive(Debug, Clone)]
pub struct EncodedPairs {
    pub vocabulary: Vocabulary,
    pub design: SparseDesign,
}

/// Encodes aligned allele columns into a sparse design matrix.
///
/// Identifiers are registered in scan order: row 0 field A, row 0 field B,
/// row 1 field A, and so on. The column count is only known at the end, so the
/// matrix is finalized with the registry size once every row has been seen.
///
/// # Panics
/// Panics if the two columns differ in length; callers pass columns of the same
/// table.
pub fn encode_pairs<S: AsRef<str>>(
    field_a: &[S],
    field_b: &[S],
    policy: CollisionPolicy,
) -> EncodedPairs {
    assert_eq!(
        field_a.len(),
        field_b.len(),
        "allele columns must have the same length"
    );
    let mut registry = AlleleRegistry::new();
    let mut design = SparseDesign::with_capacity(0, field_a.len(), 2 * field_a.len());

    for (a, b) in field_a.iter().zip(field_b.iter()) {
        let ia = registry.intern(a.as_ref());
        let ib = registry.intern(b.as_ref());
        design.push_pair(ia, ib, policy);
    }

    design.n_cols = registry.len();
    log::debug!(
        "Encoded {} rows over {} alleles ({} stored entries)",
        design.n_rows(),
        design.n_cols,
        design.nnz()
    );

    EncodedPairs {
        vocabulary: registry.freeze(),
        design,
    }
}

/// Encodes allele pairs against an existing vocabulary. Identifiers outside the
/// vocabulary contribute no entry, so a row may hold zero, one or two entries.
pub fn encode_with_vocabulary<S: AsRef<str>>(
    vocabulary: &Vocabulary,
    field_a: &[S],
    field_b: &[S],
    policy: CollisionPolicy,
) -> SparseDesign {
    assert_eq!(
        field_a.len(),
        field_b.len(),
        "allele columns must have the same length"
    );
    let mut design = SparseDesign::with_capacity(vocabulary.len(), field_a.len(), 2 * field_a.len());
    for (a, b) in field_a.iter().zip(field_b.iter()) {
        match (
            vocabulary.index_of(a.as_ref()),
            vocabulary.index_of(b.as_ref()),
        ) {
            (Some(ia), Some(ib)) => design.push_pair(ia, ib, policy),
            (Some(only), None) | (None, Some(only)) => {
                design.indices.push(only);
                design.values.push(1.0);
                design.indptr.push(design.indices.len());
            }
            (None, None) => design.indptr.push(design.indices.len()),
        }
    }
    design
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_entries(design: &SparseDesign, i: usize) -> Vec<(usize, f32)> {
        design.row(i).iter().collect()
    }

    #[test]
    fn three_row_scenario_with_sum_policy() {
        let a = ["A", "B", "A"];
        let b = ["B", "C", "A"];
        let encoded = encode_pairs(&a, &b, CollisionPolicy::Sum);

        assert_eq!(encoded.vocabulary.names(), &["A", "B", "C"]);
        assert_eq!(encoded.design.n_rows(), 3);
        assert_eq!(encoded.design.n_cols(), 3);
        assert_eq!(row_entries(&encoded.design, 0), vec![(0, 1.0), (1, 1.0)]);
        assert_eq!(row_entries(&encoded.design, 1), vec![(1, 1.0), (2, 1.0)]);
        assert_eq!(row_entries(&encoded.design, 2), vec![(0, 2.0)]);
    }

    #[test]
    fn binary_policy_keeps_self_pairs_at_one() {
        let encoded = encode_pairs(&["A", "B", "A"], &["B", "C", "A"], CollisionPolicy::Binary);
        assert_eq!(row_entries(&encoded.design, 2), vec![(0, 1.0)]);
    }

    #[test]
    fn registry_size_counts_values_across_both_fields_once() {
        let a = ["x", "y", "z", "x", "w"];
        let b = ["y", "x", "x", "w", "w"];
        let encoded = encode_pairs(&a, &b, CollisionPolicy::Sum);
        assert_eq!(encoded.vocabulary.len(), 4);
        assert_eq!(encoded.design.n_cols(), 4);
        assert_eq!(encoded.vocabulary.names(), &["x", "y", "z", "w"]);
    }

    #[test]
    fn every_row_has_two_unit_entries_unless_self_paired() {
        let a: Vec<String> = (0..200).map(|i| format!("q{}", i % 17)).collect();
        let b: Vec<String> = (0..200).map(|i| format!("q{}", (i * 7) % 23)).collect();
        let encoded = encode_pairs(&a, &b, CollisionPolicy::Sum);

        assert_eq!(encoded.design.n_rows(), 200);
        for i in 0..200 {
            let row = encoded.design.row(i);
            if a[i] == b[i] {
                assert_eq!(row.nnz(), 1);
                assert_eq!(row.values, &[2.0]);
            } else {
                assert_eq!(row.nnz(), 2);
                assert!(row.values.iter().all(|&v| v == 1.0));
                assert!(row.indices[0] < row.indices[1]);
            }
        }
    }

    #[test]
    fn empty_input_yields_empty_matrix() {
        let empty: [&str; 0] = [];
        let encoded = encode_pairs(&empty, &empty, CollisionPolicy::Sum);
        assert_eq!(encoded.design.n_rows(), 0);
        assert_eq!(encoded.design.n_cols(), 0);
        assert!(encoded.vocabulary.is_empty());
    }

    #[test]
    fn select_rows_gathers_in_requested_order() {
        let encoded = encode_pairs(&["A", "B", "A"], &["B", "C", "A"], CollisionPolicy::Sum);
        let picked = encoded.design.select_rows(&[2, 0]);
        assert_eq!(picked.n_rows(), 2);
        assert_eq!(picked.n_cols(), 3);
        assert_eq!(row_entries(&picked, 0), vec![(0, 2.0)]);
        assert_eq!(row_entries(&picked, 1), vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn dense_row_expansion_matches_sparse_entries() {
        let encoded = encode_pairs(&["A", "B"], &["C", "A"], CollisionPolicy::Sum);
        // Query and array of row 0 are interned before row 1.
        assert_eq!(encoded.vocabulary.names(), ["A", "C", "B"]);
        let mut buffer = Vec::new();
        encoded.design.row_values_dense(1, &mut buffer);
        assert_eq!(buffer, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn unknown_alleles_are_skipped_against_a_fixed_vocabulary() {
        let encoded = encode_pairs(&["A"], &["B"], CollisionPolicy::Sum);
        let design = encode_with_vocabulary(
            &encoded.vocabulary,
            &["A", "Z", "Z"],
            &["B", "B", "Y"],
            CollisionPolicy::Sum,
        );
        assert_eq!(design.n_cols(), 2);
        assert_eq!(row_entries(&design, 0), vec![(0, 1.0), (1, 1.0)]);
        assert_eq!(row_entries(&design, 1), vec![(1, 1.0)]);
        assert_eq!(design.row(2).nnz(), 0);
    }
}
