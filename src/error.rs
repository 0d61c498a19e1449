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

use thiserror::Error;

/// Errors raised while building, training or querying a model.
#[derive(Error, Debug)]
pub enum SlimError {
    /// Invalid hyperparameters, e.g. a top-k of zero.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The sampler could not find a user or a negative item within its retry budget.
    #[error("Sampling exhausted: {0}")]
    SamplingExhaustion(String),

    /// A matrix does not have the shape an operation requires.
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Index out of bounds: {index} >= {max}")]
    IndexOutOfBounds {
        index: usize,
        max: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SlimError>;
