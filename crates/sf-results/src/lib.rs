//! sf-results: experiment directory layout and run records.

pub mod hash;
pub mod store;
pub mod types;

pub use hash::compute_config_hash;
pub use store::ExperimentStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Not found in experiment {experiment}: {what}")]
    NotFound { experiment: String, what: String },
}
