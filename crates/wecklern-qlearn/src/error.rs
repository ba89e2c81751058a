use thiserror::Error;

#[derive(Debug, Error)]
pub enum QLearnError {
    #[error("Snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Unsupported snapshot version: {0}")]
    SnapshotVersion(u32),
    #[error("Invalid action: {action} (action_size {action_size})")]
    InvalidAction { action: usize, action_size: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, QLearnError>;
