use scoped_pool::Pool;

use crate::error::{Result, SlimError};
use crate::scored::{self, ScoredItem};
use crate::types::{self, SimilarityMatrix, SparseMatrix};

/// Scores items for a user as the user's interaction row times the exported similarity matrix.
pub struct Recommender<'a> {
    train: &'a SparseMatrix,
    similarity: &'a SimilarityMatrix,
}

impl<'a> Recommender<'a> {

    /// Both the interactions and a sparse similarity matrix must be row-compressed.
    pub fn new(train: &'a SparseMatrix, similarity: &'a SimilarityMatrix) -> Result<Self> {

        let column_compressed = match similarity {
            SimilarityMatrix::Sparse(matrix) => !matrix.is_csr(),
            SimilarityMatrix::Dense(_) => false,
        };

        if !train.is_csr() || column_compressed {
            return Err(SlimError::Shape(
                "interactions and similarities must be row-compressed".to_string()));
        }

        if !similarity.is_square() || similarity.num_rows() != train.cols() {
            return Err(SlimError::Shape(format!(
                "similarity matrix is {}x{}, expected {}x{}",
                similarity.num_rows(), similarity.num_cols(), train.cols(), train.cols())));
        }

        Ok(Recommender { train, similarity })
    }

    pub fn num_users(&self) -> usize {
        self.train.rows()
    }

    pub fn num_items(&self) -> usize {
        self.train.cols()
    }

    pub fn seen_items(&self, user: usize) -> &'a [usize] {
        types::row_indices(self.train, user)
    }

    /// One score per item for the given user.
    pub fn scores(&self, user: usize) -> Result<Vec<f32>> {

        if user >= self.num_users() {
            return Err(SlimError::IndexOutOfBounds { index: user, max: self.num_users() });
        }

        let mut scores = vec![0.0; self.num_items()];
        let values = types::row_values(self.train, user);

        for (item, value) in self.seen_items(user).iter().zip(values.iter()) {
            self.similarity.accumulate_row(*item, *value, &mut scores);
        }

        Ok(scores)
    }

    /// Items in descending order of score, equal scores rank the lower item index first. With
    /// `exclude_seen` the user's items are removed from the ranking, so at most
    /// `num_items - |seen|` items are returned. `at` of `None` returns the full ranking.
    pub fn recommend(&self, user: usize, at: Option<usize>, exclude_seen: bool) -> Result<Vec<u32>> {

        let scores = self.scores(user)?;
        let seen_items = self.seen_items(user);

        let candidates = scores.into_iter()
            .enumerate()
            .filter(|(item, _)| !exclude_seen || seen_items.binary_search(item).is_err())
            .map(|(item, score)| ScoredItem { item: item as u32, score });

        let ranking = match at {
            Some(at) => scored::top_k(candidates, at),
            None => {
                let mut ranking: Vec<ScoredItem> = candidates.collect();
                ranking.sort();
                ranking
            },
        };

        Ok(ranking.into_iter().map(|scored_item| scored_item.item).collect())
    }
}

/// Computes recommendations for many users in parallel, the result is aligned with `users`.
pub fn recommend_all(
    recommender: &Recommender,
    users: &[u32],
    at: Option<usize>,
    exclude_seen: bool,
    pool_size: usize,
) -> Result<Vec<Vec<u32>>> {

    let pool_size = pool_size.max(1);
    let pool = Pool::new(pool_size);

    let mut recommendations: Vec<Result<Vec<u32>>> =
        users.iter().map(|_| Ok(Vec::new())).collect();

    let chunk_size = (users.len() + pool_size - 1) / pool_size;

    if chunk_size > 0 {
        pool.scoped(|scope| {
            for (users_chunk, recommendations_chunk) in users.chunks(chunk_size)
                .zip(recommendations.chunks_mut(chunk_size)) {

                scope.execute(move || {
                    for (user, slot) in users_chunk.iter().zip(recommendations_chunk.iter_mut()) {
                        *slot = recommender.recommend(*user as usize, at, exclude_seen);
                    }
                });
            }
        });
    }

    pool.shutdown();

    recommendations.into_iter().collect()
}
