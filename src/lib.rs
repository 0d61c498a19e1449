mod scored;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod interactions;
pub mod io;
pub mod learner;
pub mod recommend;
pub mod sampling;
pub mod stats;
pub mod topk;
pub mod types;
pub mod utils;

pub use config::{TrainingConfig, UpdateRule};
pub use error::{Result, SlimError};
pub use interactions::InteractionStore;
pub use learner::{fit, FitResult, TrainingContext, Validation};
pub use recommend::{recommend_all, Recommender};
pub use topk::select_top_k;
pub use types::{DenseMatrix, SimilarityMatrix, SparseMatrix};
