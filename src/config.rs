//! Hyperparameters for training the item-item similarity matrix.

use serde_derive::{Deserialize, Serialize};

use crate::error::{Result, SlimError};
use crate::sampling::DEFAULT_RETRY_BUDGET;

/// Update rule applied to the similarity matrix for every sampled batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRule {
    /// One scalar gradient per batch, averaged over the batch, applied to every item positively
    /// rated by any user of the batch. Ignores `lambda_i` and `lambda_j`.
    Batch,
    /// Per sample update restricted to the user's positive items, regularized with `lambda_i`
    /// and `lambda_j`.
    LoopRegularized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of epochs, epoch 0 only exports the untrained matrix.
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub lambda_i: f32,
    pub lambda_j: f32,
    /// Number of weights to keep per item, `None` keeps all of them.
    pub top_k: Option<usize>,
    /// Export the similarity matrix in sparse form even without top-k selection. The trained
    /// matrix S itself always stays dense.
    pub sparse_weights: bool,
    pub validate_every_n_epochs: usize,
    pub start_validation_after_n_epochs: usize,
    pub min_ratings_per_user: usize,
    pub update_rule: UpdateRule,
    /// Seed for the sampler, `None` seeds from the operating system.
    pub seed: Option<u64>,
    /// Maximum number of rejection sampling attempts per drawn user or item.
    pub sampling_retry_budget: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 30,
            batch_size: 1000,
            learning_rate: 0.05,
            lambda_i: 0.0025,
            lambda_j: 0.00025,
            top_k: None,
            sparse_weights: false,
            validate_every_n_epochs: 1,
            start_validation_after_n_epochs: 0,
            min_ratings_per_user: 1,
            update_rule: UpdateRule::Batch,
            seed: None,
            sampling_retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl TrainingConfig {

    pub fn validate(&self) -> Result<()> {

        if let Some(top_k) = self.top_k {
            if top_k < 1 {
                return Err(SlimError::Configuration(format!(
                    "TopK not valid. Acceptable values are either disabled or a positive integer \
                     value. Provided value was '{}'", top_k)));
            }
        }

        if self.epochs == 0 {
            return Err(SlimError::Configuration("epochs must be at least 1".to_string()));
        }

        if self.batch_size == 0 {
            return Err(SlimError::Configuration("batch size must be at least 1".to_string()));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SlimError::Configuration(format!(
                "learning rate must be positive, got {}", self.learning_rate)));
        }

        if !(self.lambda_i >= 0.0 && self.lambda_j >= 0.0) {
            return Err(SlimError::Configuration(format!(
                "regularization must be non-negative, got lambda_i={} lambda_j={}",
                self.lambda_i, self.lambda_j)));
        }

        if self.validate_every_n_epochs == 0 {
            return Err(SlimError::Configuration(
                "validation cadence must be at least 1 epoch".to_string()));
        }

        if self.sampling_retry_budget == 0 {
            return Err(SlimError::Configuration(
                "sampling retry budget must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Whether the evaluation collaborator runs after the given epoch.
    pub fn validates_after(&self, epoch: usize) -> bool {
        epoch % self.validate_every_n_epochs == 0 && epoch >= self.start_validation_after_n_epochs
    }
}


#[cfg(test)]
mod tests {

    use crate::config::{TrainingConfig, UpdateRule};
    use crate::error::SlimError;

    #[test]
    fn defaults_are_valid() {
        let config = TrainingConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.update_rule, UpdateRule::Batch);
        assert_eq!(config.top_k, None);
    }

    #[test]
    fn zero_top_k_is_a_configuration_error() {
        let config = TrainingConfig { top_k: Some(0), ..TrainingConfig::default() };

        match config.validate() {
            Err(SlimError::Configuration(message)) => assert!(message.contains("TopK")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        let invalid = vec![
            TrainingConfig { epochs: 0, ..TrainingConfig::default() },
            TrainingConfig { batch_size: 0, ..TrainingConfig::default() },
            TrainingConfig { learning_rate: 0.0, ..TrainingConfig::default() },
            TrainingConfig { learning_rate: std::f32::NAN, ..TrainingConfig::default() },
            TrainingConfig { lambda_j: -0.1, ..TrainingConfig::default() },
            TrainingConfig { validate_every_n_epochs: 0, ..TrainingConfig::default() },
            TrainingConfig { sampling_retry_budget: 0, ..TrainingConfig::default() },
        ];

        for config in invalid {
            assert!(config.validate().is_err(), "{:?} should be invalid", config);
        }
    }

    #[test]
    fn validation_cadence() {
        let config = TrainingConfig {
            validate_every_n_epochs: 2,
            start_validation_after_n_epochs: 3,
            ..TrainingConfig::default()
        };

        let validated: Vec<usize> = (0..8).filter(|epoch| config.validates_after(*epoch)).collect();
        assert_eq!(validated, vec![4, 6]);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"epochs": 5, "top_k": 20, "update_rule": "LoopRegularized"}"#)
                .unwrap();

        assert_eq!(config.epochs, 5);
        assert_eq!(config.top_k, Some(20));
        assert_eq!(config.update_rule, UpdateRule::LoopRegularized);
        assert_eq!(config.batch_size, 1000);
    }
}
