//! Offline ranking evaluation against held-out interactions.

use log::debug;
use serde_derive::Serialize;

use crate::error::{Result, SlimError};
use crate::recommend::Recommender;
use crate::types::{self, SparseMatrix};

pub const DEFAULT_CUTOFF: usize = 5;

/// Ranking metrics averaged over all evaluated users.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub map: f64,
    pub mrr: f64,
    pub ndcg: f64,
    pub num_users_evaluated: usize,
}

/// Computes quality metrics for the recommendations of the current model. The learner only
/// invokes it and logs whatever it returns.
pub trait Evaluator {
    fn evaluate(
        &self,
        recommender: &Recommender,
        test: &SparseMatrix,
        min_ratings_per_user: usize,
    ) -> Result<EvaluationResult>;
}

/// Evaluates the top `cutoff` recommendations (with seen items excluded) of every user having
/// at least `min_ratings_per_user` held-out interactions.
pub struct RankingEvaluator {
    pub cutoff: usize,
}

impl Default for RankingEvaluator {
    fn default() -> Self {
        RankingEvaluator { cutoff: DEFAULT_CUTOFF }
    }
}

impl Evaluator for RankingEvaluator {

    fn evaluate(
        &self,
        recommender: &Recommender,
        test: &SparseMatrix,
        min_ratings_per_user: usize,
    ) -> Result<EvaluationResult> {

        if !test.is_csr() {
            return Err(SlimError::Shape("test matrix must be row-compressed".to_string()));
        }

        if test.cols() != recommender.num_items() {
            return Err(SlimError::Shape(format!(
                "test matrix has {} items, model has {}", test.cols(), recommender.num_items())));
        }

        let mut totals = EvaluationResult::default();

        for user in 0..test.rows().min(recommender.num_users()) {

            let relevant_items = types::row_indices(test, user);

            if relevant_items.is_empty() || relevant_items.len() < min_ratings_per_user ||
                recommender.seen_items(user).is_empty() {
                continue;
            }

            let recommended_items = recommender.recommend(user, Some(self.cutoff), true)?;

            let is_relevant: Vec<bool> = recommended_items.iter()
                .map(|item| relevant_items.binary_search(&(*item as usize)).is_ok())
                .collect();

            totals.auc += roc_auc(&is_relevant);
            totals.precision += precision(&is_relevant);
            totals.recall += recall(&is_relevant, relevant_items.len());
            totals.map += average_precision(&is_relevant, relevant_items.len());
            totals.mrr += reciprocal_rank(&is_relevant);
            totals.ndcg += ndcg(&is_relevant, relevant_items.len(), self.cutoff);
            totals.num_users_evaluated += 1;
        }

        debug!("Evaluated {} users at cutoff {}", totals.num_users_evaluated, self.cutoff);

        if totals.num_users_evaluated > 0 {
            let num_users = totals.num_users_evaluated as f64;
            totals.auc /= num_users;
            totals.precision /= num_users;
            totals.recall /= num_users;
            totals.map /= num_users;
            totals.mrr /= num_users;
            totals.ndcg /= num_users;
        }

        Ok(totals)
    }
}

fn roc_auc(is_relevant: &[bool]) -> f64 {
    let num_positives = is_relevant.iter().filter(|relevant| **relevant).count();
    let num_negatives = is_relevant.len() - num_positives;

    if num_negatives == 0 {
        return 1.0;
    }

    if num_positives == 0 {
        return 0.0;
    }

    // Number of (relevant, non-relevant) pairs ranked in the right order
    let mut negatives_below = num_negatives;
    let mut correctly_ordered = 0;
    for relevant in is_relevant.iter() {
        if *relevant {
            correctly_ordered += negatives_below;
        } else {
            negatives_below -= 1;
        }
    }

    correctly_ordered as f64 / (num_positives * num_negatives) as f64
}

fn precision(is_relevant: &[bool]) -> f64 {
    if is_relevant.is_empty() {
        return 0.0;
    }
    is_relevant.iter().filter(|relevant| **relevant).count() as f64 / is_relevant.len() as f64
}

fn recall(is_relevant: &[bool], num_relevant_items: usize) -> f64 {
    is_relevant.iter().filter(|relevant| **relevant).count() as f64 / num_relevant_items as f64
}

fn average_precision(is_relevant: &[bool], num_relevant_items: usize) -> f64 {
    let denominator = num_relevant_items.min(is_relevant.len());
    if denominator == 0 {
        return 0.0;
    }

    let mut hits = 0;
    let mut sum_of_precisions = 0.0;
    for (rank, relevant) in is_relevant.iter().enumerate() {
        if *relevant {
            hits += 1;
            sum_of_precisions += hits as f64 / (rank + 1) as f64;
        }
    }

    sum_of_precisions / denominator as f64
}

fn reciprocal_rank(is_relevant: &[bool]) -> f64 {
    match is_relevant.iter().position(|relevant| *relevant) {
        Some(rank) => 1.0 / (rank + 1) as f64,
        None => 0.0,
    }
}

fn ndcg(is_relevant: &[bool], num_relevant_items: usize, cutoff: usize) -> f64 {
    let discount = |rank: usize| 1.0 / ((rank + 2) as f64).log2();

    let dcg: f64 = is_relevant.iter()
        .enumerate()
        .filter(|(_, relevant)| **relevant)
        .map(|(rank, _)| discount(rank))
        .sum();

    let ideal_dcg: f64 = (0..num_relevant_items.min(cutoff)).map(discount).sum();

    if ideal_dcg == 0.0 { 0.0 } else { dcg / ideal_dcg }
}
