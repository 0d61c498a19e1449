/*
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

//! Column-wise top-k sparsification of item-item weight matrices.
//!
//! Both representations share one contract: for every column, only the `k` largest non-zero
//! values survive, ties are broken in favor of the lower row index, and the shape is unchanged.

use std::time::Instant;

use log::debug;
use ndarray::Axis;
use sprs::TriMat;

use crate::error::{Result, SlimError};
use crate::scored::{self, ScoredItem};
use crate::types::{self, DenseMatrix, SimilarityMatrix, SparseMatrix};
use crate::utils;

/// Keeps the `k` largest entries of every column of a square matrix. Dense inputs are modified
/// in place and returned densely unless `force_sparse` is set, sparse inputs always come back in
/// row-compressed form.
pub fn select_top_k(
    item_weights: SimilarityMatrix,
    k: usize,
    force_sparse: bool,
) -> Result<SimilarityMatrix> {

    if !item_weights.is_square() {
        return Err(SlimError::Shape(format!(
            "top-k selection requires a square matrix, got {}x{}",
            item_weights.num_rows(), item_weights.num_cols())));
    }

    if k == 0 {
        return Err(SlimError::Configuration(
            "top-k selection requires k to be a positive integer".to_string()));
    }

    let start = Instant::now();
    let k = k.min(item_weights.num_cols());

    let selected = match item_weights {
        SimilarityMatrix::Dense(weights) => {
            let weights = select_top_k_dense(weights, k);
            if force_sparse {
                SimilarityMatrix::Sparse(types::sparse_from_dense(&weights))
            } else {
                SimilarityMatrix::Dense(weights)
            }
        },
        SimilarityMatrix::Sparse(weights) =>
            SimilarityMatrix::Sparse(select_top_k_sparse(&weights, k)),
    };

    debug!("Top-{} matrix ({}) generated in {}ms",
        k, if selected.is_sparse() { "sparse" } else { "dense" }, utils::to_millis(start.elapsed()));

    Ok(selected)
}

fn select_top_k_dense(mut weights: DenseMatrix, k: usize) -> DenseMatrix {

    for mut column in weights.axis_iter_mut(Axis(1)) {

        let mut candidates: Vec<ScoredItem> = column.iter()
            .enumerate()
            .filter(|(_, score)| **score != 0.0)
            .map(|(row, score)| ScoredItem { item: row as u32, score: *score })
            .collect();

        if candidates.len() <= k {
            continue;
        }

        candidates.sort();

        for not_top_k in candidates[k..].iter() {
            column[not_top_k.item as usize] = 0.0;
        }
    }

    weights
}

fn select_top_k_sparse(weights: &SparseMatrix, k: usize) -> SparseMatrix {

    let by_column = weights.to_csc();
    let mut selected = TriMat::with_capacity(weights.shape(), k * weights.cols());

    for (col, column) in by_column.outer_iterator().enumerate() {

        let non_zero = column.iter()
            .filter(|(_, value)| **value != 0.0)
            .map(|(row, value)| ScoredItem { item: row as u32, score: *value });

        for scored_item in scored::top_k(non_zero, k).into_iter() {
            selected.add_triplet(scored_item.item as usize, col, scored_item.score);
        }
    }

    selected.to_csr()
}
