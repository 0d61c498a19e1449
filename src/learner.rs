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

//! Learns the item-item matrix S with mini-batch SGD on the BPR objective.
//!
//! S[i, l] is the contribution of item `l` in a user's history to the score of item `i`, so the
//! matrix used for scoring is the transpose of S.

use std::io::Write;
use std::time::{Duration, Instant};

use fnv::FnvHashSet;
use log::info;
use ndarray::Array2;
use serde_derive::Serialize;

use crate::config::{TrainingConfig, UpdateRule};
use crate::error::Result;
use crate::evaluation::{EvaluationResult, Evaluator};
use crate::interactions::InteractionStore;
use crate::recommend::Recommender;
use crate::sampling::{Batch, NegativeSampler};
use crate::topk;
use crate::types::{self, DenseMatrix, SimilarityMatrix, SparseMatrix};
use crate::utils;

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Held-out interactions and the collaborator which evaluates the model on them.
pub struct Validation<'a> {
    pub test: &'a SparseMatrix,
    pub evaluator: &'a dyn Evaluator,
    /// Receives one line per evaluation in addition to the log.
    pub log_sink: Option<&'a mut dyn Write>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpochEvaluation {
    pub epoch: usize,
    pub results: EvaluationResult,
}

/// Hyperparameter snapshot reported alongside every evaluation.
#[derive(Serialize)]
struct CurrentConfig {
    lambda_i: f32,
    lambda_j: f32,
    batch_size: usize,
    learn_rate: f32,
    top_k_similarity: Option<usize>,
    epoch: usize,
}

/// Everything a single training run mutates: the weights S, the exported similarity matrix and
/// the sampler with its random state.
pub struct TrainingContext<'a> {
    store: &'a InteractionStore,
    config: TrainingConfig,
    sampler: NegativeSampler<'a>,
    weights: DenseMatrix,
    similarity: SimilarityMatrix,
}

impl<'a> TrainingContext<'a> {

    pub fn new(store: &'a InteractionStore, config: TrainingConfig) -> Result<Self> {

        config.validate()?;

        let mut sampler = NegativeSampler::new(store, config.seed, config.sampling_retry_budget);
        sampler.initialize_fast_sampling();

        let num_items = store.num_items();
        let weights = Array2::zeros((num_items, num_items));
        let similarity = export_similarity(&weights, config.top_k, config.sparse_weights)?;

        Ok(TrainingContext { store, config, sampler, weights, similarity })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// The trainable matrix S.
    pub fn weights(&self) -> &DenseMatrix {
        &self.weights
    }

    /// The matrix exported after the last completed epoch, used for scoring.
    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    pub fn into_similarity(self) -> SimilarityMatrix {
        self.similarity
    }

    pub fn recommender(&self) -> Result<Recommender> {
        Recommender::new(self.store.train(), &self.similarity)
    }

    pub fn update_similarity_matrix(&mut self) -> Result<()> {
        self.similarity =
            export_similarity(&self.weights, self.config.top_k, self.config.sparse_weights)?;
        Ok(())
    }

    /// Runs one pass of roughly as many samples as there are positive interactions, then clears
    /// the diagonal of S and exports the similarity matrix. Returns the number of samples drawn.
    pub fn epoch_iteration(&mut self) -> Result<usize> {

        let num_positive_interactions = self.store.num_positive_interactions();
        let batch_size = self.config.batch_size;
        let total_number_of_batches = num_positive_interactions / batch_size + 1;

        let start_epoch = Instant::now();
        let mut start_batch = Instant::now();

        for current_batch in 0..total_number_of_batches {

            let batch = self.sampler.sample_batch(batch_size)?;

            match self.config.update_rule {
                UpdateRule::Batch =>
                    update_weights_batch(
                        &mut self.weights,
                        self.store,
                        &batch,
                        self.config.learning_rate,
                    ),
                UpdateRule::LoopRegularized =>
                    update_weights_loop(
                        &mut self.weights,
                        self.store,
                        &batch,
                        self.config.learning_rate,
                        self.config.lambda_i,
                        self.config.lambda_j,
                    ),
            }

            if start_batch.elapsed() >= THROUGHPUT_LOG_INTERVAL ||
                current_batch == total_number_of_batches - 1 {

                let num_processed = (current_batch + 1) * batch_size;
                let seconds_since_epoch_start = start_epoch.elapsed().as_secs_f64();

                info!("Processed {} ( {:.2}% ) in {:.2} seconds. Samples per second: {:.0}",
                    num_processed,
                    100.0 * num_processed as f64 / num_positive_interactions.max(1) as f64,
                    start_batch.elapsed().as_secs_f64(),
                    num_processed as f64 / seconds_since_epoch_start.max(1e-9));

                start_batch = Instant::now();
            }
        }

        self.weights.diag_mut().fill(0.0);
        self.update_similarity_matrix()?;

        Ok(total_number_of_batches * batch_size)
    }

    /// Epoch 0 only exports the untrained matrix as a baseline, every further epoch trains.
    /// With a `validation`, the evaluator runs on the configured cadence and its results are
    /// returned in epoch order.
    pub fn fit(&mut self, mut validation: Option<Validation>) -> Result<Vec<EpochEvaluation>> {

        let epochs = self.config.epochs;
        let mut evaluations = Vec::new();

        let start_train = Instant::now();

        for current_epoch in 0..epochs {

            let start_epoch = Instant::now();

            if current_epoch > 0 {
                self.epoch_iteration()?;
            } else {
                self.update_similarity_matrix()?;
            }

            if let Some(validation) = validation.as_mut() {
                if self.config.validates_after(current_epoch) {

                    info!("Evaluation begins");

                    let results = {
                        let recommender = self.recommender()?;
                        validation.evaluator.evaluate(
                            &recommender,
                            validation.test,
                            self.config.min_ratings_per_user,
                        )?
                    };

                    let test_case = self.current_config_line(current_epoch, &results)?;
                    info!("{}", test_case);

                    if let Some(sink) = validation.log_sink.as_mut() {
                        writeln!(sink, "{}", test_case)?;
                        sink.flush()?;
                    }

                    evaluations.push(EpochEvaluation { epoch: current_epoch, results });
                }
            }

            info!("Epoch {} of {} complete in {:.2} minutes",
                current_epoch, epochs, utils::to_minutes(start_epoch.elapsed()));
        }

        info!("Fit completed in {:.2} minutes", utils::to_minutes(start_train.elapsed()));

        Ok(evaluations)
    }

    fn current_config_line(
        &self,
        current_epoch: usize,
        results: &EvaluationResult,
    ) -> Result<String> {

        let current_config = CurrentConfig {
            lambda_i: self.config.lambda_i,
            lambda_j: self.config.lambda_j,
            batch_size: self.config.batch_size,
            learn_rate: self.config.learning_rate,
            top_k_similarity: self.config.top_k,
            epoch: current_epoch,
        };

        Ok(format!("Test case: {}, Results {}",
            serde_json::to_string(&current_config)?, serde_json::to_string(results)?))
    }
}

/// The result of a complete training run.
pub struct FitResult {
    pub similarity: SimilarityMatrix,
    pub evaluations: Vec<EpochEvaluation>,
}

/// Trains a fresh model on `store`.
pub fn fit(
    store: &InteractionStore,
    config: TrainingConfig,
    validation: Option<Validation>,
) -> Result<FitResult> {

    let mut context = TrainingContext::new(store, config)?;
    let evaluations = context.fit(validation)?;

    Ok(FitResult { similarity: context.into_similarity(), evaluations })
}

/// Transposes S into the matrix used for scoring. With `top_k` only the k largest weights per
/// column survive and the result is always sparse.
pub fn export_similarity(
    weights: &DenseMatrix,
    top_k: Option<usize>,
    sparse_weights: bool,
) -> Result<SimilarityMatrix> {

    let transposed: DenseMatrix = weights.t().as_standard_layout().into_owned();

    match top_k {
        Some(k) => topk::select_top_k(SimilarityMatrix::Dense(transposed), k, true),
        None if sparse_weights =>
            Ok(SimilarityMatrix::Sparse(types::sparse_from_dense(&transposed))),
        None => Ok(SimilarityMatrix::Dense(transposed)),
    }
}

#[inline(always)]
fn score_margin(
    weights: &DenseMatrix,
    seen_items: &[usize],
    positive_item: usize,
    negative_item: usize,
) -> f32 {
    let row_i = weights.row(positive_item);
    let row_j = weights.row(negative_item);

    seen_items.iter()
        .map(|item| row_i[*item] - row_j[*item])
        .sum()
}

/// Default update rule, does not apply regularization.
///
/// A single sample moves S[i, seen] up and S[j, seen] down by `learning_rate * gradient`. For
/// larger batches, the gradient is the mean over the batch and is applied to every item positively
/// rated by any user of the batch; each distinct row among the positives (negatives) moves once.
pub fn update_weights_batch(
    weights: &mut DenseMatrix,
    store: &InteractionStore,
    batch: &Batch,
    learning_rate: f32,
) {

    if batch.is_empty() {
        return;
    }

    if batch.len() == 1 {

        let user_seen_items = store.positive_items(batch.users[0]);
        let i = batch.positive_items[0];
        let j = batch.negative_items[0];

        let x_uij = score_margin(weights, user_seen_items, i, j);
        let step = learning_rate * utils::bpr_gradient(x_uij);

        let mut row_i = weights.row_mut(i);
        for item in user_seen_items.iter() {
            row_i[*item] += step;
        }
        weights[[i, i]] = 0.0;

        let mut row_j = weights.row_mut(j);
        for item in user_seen_items.iter() {
            row_j[*item] -= step;
        }
        weights[[j, j]] = 0.0;

        return;
    }

    let mut gradient_sum = 0.0;
    for sample in 0..batch.len() {
        let user_seen_items = store.positive_items(batch.users[sample]);
        let x_uij = score_margin(
            weights,
            user_seen_items,
            batch.positive_items[sample],
            batch.negative_items[sample],
        );
        gradient_sum += utils::bpr_gradient(x_uij);
    }

    let gradient = gradient_sum / batch.len() as f32;
    let step = learning_rate * gradient;

    let mut items_to_update = FnvHashSet::default();
    for user in batch.users.iter() {
        items_to_update.extend(store.positive_items(*user).iter().cloned());
    }
    let mut items_to_update: Vec<usize> = items_to_update.into_iter().collect();
    items_to_update.sort();

    let positive_rows: FnvHashSet<usize> = batch.positive_items.iter().cloned().collect();
    for row in positive_rows.iter() {
        let mut row_i = weights.row_mut(*row);
        for item in items_to_update.iter() {
            row_i[*item] += step;
        }
    }
    for row in positive_rows.iter() {
        weights[[*row, *row]] = 0.0;
    }

    let negative_rows: FnvHashSet<usize> = batch.negative_items.iter().cloned().collect();
    for row in negative_rows.iter() {
        let mut row_j = weights.row_mut(*row);
        for item in items_to_update.iter() {
            row_j[*item] -= step;
        }
    }
    for row in negative_rows.iter() {
        weights[[*row, *row]] = 0.0;
    }
}

/// Regularized per sample update: for every positive item `l` of the sampled user,
/// `S[i, l] += lr * (g - lambda_i * S[i, l])` unless `l == i` and
/// `S[j, l] += lr * (-g - lambda_j * S[j, l])` unless `l == j`, with `g = 1 / (1 + e^x_uij)`.
///
/// This departs from the classic loop formulation, which takes `x_uij` as the element-wise
/// difference of the whole rows `S[i] - S[j]`. Here the margin is summed over the user's
/// positive items only, as in `update_weights_batch`.
pub fn update_weights_loop(
    weights: &mut DenseMatrix,
    store: &InteractionStore,
    batch: &Batch,
    learning_rate: f32,
    lambda_i: f32,
    lambda_j: f32,
) {

    for sample in 0..batch.len() {

        let user_seen_items = store.positive_items(batch.users[sample]);
        let i = batch.positive_items[sample];
        let j = batch.negative_items[sample];

        let sigmoid = utils::bpr_gradient(score_margin(weights, user_seen_items, i, j));

        for item in user_seen_items.iter().cloned() {

            if item != i {
                let current = weights[[i, item]];
                weights[[i, item]] = current + learning_rate * (sigmoid - lambda_i * current);
            }

            if item != j {
                let current = weights[[j, item]];
                weights[[j, item]] = current + learning_rate * (-sigmoid - lambda_j * current);
            }
        }
    }
}
