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

use sprs::TriMat;

use crate::error::{Result, SlimError};
use crate::types::{self, SparseMatrix};

pub const DEFAULT_POSITIVE_THRESHOLD: f32 = 3.0;

/// The training interactions (users x items) together with the positive mask, which holds the
/// interactions with a value of at least `positive_threshold`.
#[derive(Clone, Debug)]
pub struct InteractionStore {
    train: SparseMatrix,
    positive_mask: SparseMatrix,
    positive_threshold: f32,
}

impl InteractionStore {

    /// Column-compressed input is converted to rows.
    pub fn new(train: SparseMatrix, positive_threshold: f32) -> Result<Self> {

        if !positive_threshold.is_finite() {
            return Err(SlimError::Configuration(format!(
                "positive threshold must be finite, got {}", positive_threshold)));
        }

        if train.cols() == 0 {
            return Err(SlimError::Shape("interaction matrix has no items".to_string()));
        }

        let train = if train.is_csr() { train } else { train.to_csr() };

        let mut positives = TriMat::with_capacity(train.shape(), train.nnz());
        for (value, (user, item)) in train.iter() {
            if *value >= positive_threshold {
                positives.add_triplet(user, item, 1.0);
            }
        }
        let positive_mask: SparseMatrix = positives.to_csr();

        Ok(InteractionStore { train, positive_mask, positive_threshold })
    }

    pub fn num_users(&self) -> usize {
        self.train.rows()
    }

    pub fn num_items(&self) -> usize {
        self.train.cols()
    }

    pub fn positive_threshold(&self) -> f32 {
        self.positive_threshold
    }

    pub fn train(&self) -> &SparseMatrix {
        &self.train
    }

    pub fn positive_mask(&self) -> &SparseMatrix {
        &self.positive_mask
    }

    /// Total number of positive interactions.
    pub fn num_positive_interactions(&self) -> usize {
        self.positive_mask.nnz()
    }

    /// All items the user interacted with, regardless of the interaction value. Sorted.
    #[inline(always)]
    pub fn seen_items(&self, user: usize) -> &[usize] {
        types::row_indices(&self.train, user)
    }

    /// Items the user interacted with positively. Sorted.
    #[inline(always)]
    pub fn positive_items(&self, user: usize) -> &[usize] {
        types::row_indices(&self.positive_mask, user)
    }

    #[inline(always)]
    pub fn is_positive(&self, user: usize, item: usize) -> bool {
        self.positive_items(user).binary_search(&item).is_ok()
    }

    /// Users with at least one positive interaction.
    pub fn eligible_users(&self) -> Vec<usize> {
        (0..self.num_users())
            .filter(|user| !self.positive_items(*user).is_empty())
            .collect()
    }
}


#[cfg(test)]
mod tests {

    use crate::interactions::InteractionStore;
    use crate::types;

    fn store() -> InteractionStore {
        let train = types::new_sparse_matrix(3, 4, &[
            (0, 0, 5.0),
            (0, 2, 1.0),
            (1, 1, 3.0),
            (1, 3, 4.0),
            (2, 2, 2.0),
        ]).unwrap();

        InteractionStore::new(train, 3.0).unwrap()
    }

    #[test]
    fn positive_mask_uses_threshold_inclusively() {
        let store = store();

        assert_eq!(store.num_positive_interactions(), 3);
        assert_eq!(store.positive_items(0), &[0]);
        assert_eq!(store.positive_items(1), &[1, 3]);
        assert!(store.positive_items(2).is_empty());

        assert!(store.is_positive(1, 3));
        assert!(!store.is_positive(0, 2));
    }

    #[test]
    fn seen_items_ignore_threshold() {
        let store = store();

        assert_eq!(store.seen_items(0), &[0, 2]);
        assert_eq!(store.seen_items(2), &[2]);
    }

    #[test]
    fn eligible_users_have_positives() {
        assert_eq!(store().eligible_users(), vec![0, 1]);
    }

    #[test]
    fn column_compressed_input_is_accepted() {
        let train = types::new_sparse_matrix(2, 3, &[(0, 2, 4.0), (1, 0, 1.0), (1, 2, 3.0)])
            .unwrap()
            .to_csc();

        let store = InteractionStore::new(train, 3.0).unwrap();

        assert!(store.train().is_csr());
        assert_eq!(store.seen_items(1), &[0, 2]);
        assert_eq!(store.positive_items(1), &[2]);
    }

    #[test]
    fn non_finite_threshold_is_rejected() {
        let train = types::new_sparse_matrix(1, 1, &[(0, 0, 1.0)]).unwrap();
        assert!(InteractionStore::new(train, std::f32::NAN).is_err());
    }
}
