/**
 * SlimBPR
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use ndarray::Array2;
use sprs::{CsMat, TriMat};

use crate::error::{Result, SlimError};

pub type DenseMatrix = Array2<f32>;

/// Row-compressed unless stated otherwise.
pub type SparseMatrix = CsMat<f32>;

/// Builds a row-compressed matrix from `(row, col, value)` triplets. Duplicate coordinates are
/// summed and entries which end up as zero are dropped.
pub fn new_sparse_matrix(
    num_rows: usize,
    num_cols: usize,
    triplets: &[(u32, u32, f32)],
) -> Result<SparseMatrix> {

    let mut entries = TriMat::with_capacity((num_rows, num_cols), triplets.len());

    for &(row, col, value) in triplets.iter() {
        if row as usize >= num_rows {
            return Err(SlimError::IndexOutOfBounds { index: row as usize, max: num_rows });
        }
        if col as usize >= num_cols {
            return Err(SlimError::IndexOutOfBounds { index: col as usize, max: num_cols });
        }
        entries.add_triplet(row as usize, col as usize, value);
    }

    let matrix: SparseMatrix = entries.to_csr();

    if matrix.data().iter().all(|value| *value != 0.0) {
        return Ok(matrix);
    }

    let mut non_zeros = TriMat::with_capacity(matrix.shape(), matrix.nnz());
    for (value, (row, col)) in matrix.iter() {
        if *value != 0.0 {
            non_zeros.add_triplet(row, col, *value);
        }
    }

    Ok(non_zeros.to_csr())
}

/// Sparse copy of a dense matrix, entries equal to zero are not stored.
pub fn sparse_from_dense(dense: &DenseMatrix) -> SparseMatrix {
    let mut entries = TriMat::new(dense.dim());
    for ((row, col), value) in dense.indexed_iter() {
        if *value != 0.0 {
            entries.add_triplet(row, col, *value);
        }
    }
    entries.to_csr()
}

/// Column indices of a row of a row-compressed matrix. Sorted.
#[inline(always)]
pub fn row_indices(matrix: &SparseMatrix, row: usize) -> &[usize] {
    &matrix.indices()[matrix.indptr().outer_inds_sz(row)]
}

#[inline(always)]
pub fn row_values(matrix: &SparseMatrix, row: usize) -> &[f32] {
    &matrix.data()[matrix.indptr().outer_inds_sz(row)]
}

/// An item-item weight matrix in either of the two supported representations. Sparse matrices
/// are row-compressed.
#[derive(Clone, Debug, PartialEq)]
pub enum SimilarityMatrix {
    Dense(DenseMatrix),
    Sparse(SparseMatrix),
}

impl SimilarityMatrix {

    pub fn num_rows(&self) -> usize {
        match self {
            SimilarityMatrix::Dense(matrix) => matrix.nrows(),
            SimilarityMatrix::Sparse(matrix) => matrix.rows(),
        }
    }

    pub fn num_cols(&self) -> usize {
        match self {
            SimilarityMatrix::Dense(matrix) => matrix.ncols(),
            SimilarityMatrix::Sparse(matrix) => matrix.cols(),
        }
    }

    pub fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }

    pub fn is_sparse(&self) -> bool {
        match self {
            SimilarityMatrix::Dense(_) => false,
            SimilarityMatrix::Sparse(_) => true,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        match self {
            SimilarityMatrix::Dense(matrix) => matrix[[row, col]],
            SimilarityMatrix::Sparse(matrix) => matrix.get(row, col).cloned().unwrap_or(0.0),
        }
    }

    /// Adds `weight` times the given row to `scores`.
    #[inline(always)]
    pub fn accumulate_row(&self, row: usize, weight: f32, scores: &mut [f32]) {
        match self {
            SimilarityMatrix::Dense(matrix) => {
                for (score, value) in scores.iter_mut().zip(matrix.row(row).iter()) {
                    *score += weight * *value;
                }
            },
            SimilarityMatrix::Sparse(matrix) => {
                let values = row_values(matrix, row);
                for (col, value) in row_indices(matrix, row).iter().zip(values.iter()) {
                    scores[*col] += weight * *value;
                }
            },
        }
    }

    pub fn to_dense(&self) -> DenseMatrix {
        match self {
            SimilarityMatrix::Dense(matrix) => matrix.clone(),
            SimilarityMatrix::Sparse(matrix) => matrix.to_dense(),
        }
    }
}


#[cfg(test)]
mod tests {

    use ndarray::array;

    use crate::error::SlimError;
    use crate::types::{self, SimilarityMatrix};

    #[test]
    fn triplets_are_summed_and_zeros_dropped() {
        let matrix = types::new_sparse_matrix(2, 3, &[
            (1, 2, 1.0),
            (0, 1, 2.0),
            (1, 2, 3.0),
            (0, 0, 0.0),
            (1, 0, 5.0),
            (0, 2, 1.5),
            (0, 2, -1.5),
        ]).unwrap();

        assert!(matrix.is_csr());
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(types::row_indices(&matrix, 0), &[1]);
        assert_eq!(types::row_indices(&matrix, 1), &[0, 2]);
        assert_eq!(types::row_values(&matrix, 1), &[5.0, 4.0]);
        assert_eq!(matrix.get(0, 2), None);
    }

    #[test]
    fn triplets_out_of_bounds_are_rejected() {
        match types::new_sparse_matrix(2, 2, &[(0, 2, 1.0)]) {
            Err(SlimError::IndexOutOfBounds { index, max }) => {
                assert_eq!(index, 2);
                assert_eq!(max, 2);
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn dense_to_sparse_keeps_non_zeros() {
        let dense = array![
            [0.0, 1.0, 0.0],
            [2.0, 0.0, 3.0],
        ];

        let sparse = types::sparse_from_dense(&dense);

        assert_eq!(sparse.shape(), (2, 3));
        assert_eq!(sparse.nnz(), 3);
        assert_eq!(sparse.to_dense(), dense);
        assert_eq!(types::sparse_from_dense(&dense.t().to_owned()).to_dense(), dense.t());
    }

    #[test]
    fn accumulate_rows_in_both_representations() {
        let dense = array![
            [0.0, 1.0, 2.0],
            [3.0, 0.0, 0.5],
            [0.0, 0.0, 0.0],
        ];

        for similarity in vec![
            SimilarityMatrix::Sparse(types::sparse_from_dense(&dense)),
            SimilarityMatrix::Dense(dense.clone()),
        ] {
            let mut scores = vec![0.0; 3];
            similarity.accumulate_row(0, 2.0, &mut scores);
            similarity.accumulate_row(1, 1.0, &mut scores);
            similarity.accumulate_row(2, 7.0, &mut scores);

            assert_eq!(scores, vec![3.0, 2.0, 4.5]);
            assert_eq!(similarity.get(1, 2), 0.5);
            assert_eq!(similarity.get(2, 2), 0.0);
            assert_eq!(similarity.to_dense(), dense);
        }
    }
}
