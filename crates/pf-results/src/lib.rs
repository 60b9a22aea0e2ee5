//! pf-results: solution snapshots, restart checkpoints and run manifests.

pub mod store;
pub mod types;

pub use store::{SnapshotStore, time_label};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint not found: {path}")]
    CheckpointNotFound { path: String },

    #[error("Manifest not found in {dir}")]
    ManifestNotFound { dir: String },
}

impl From<ResultsError> for pf_sim::SimError {
    fn from(e: ResultsError) -> Self {
        pf_sim::SimError::Backend {
            message: e.to_string(),
        }
    }
}
