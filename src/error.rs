use crate::config::ConfigError;
use crate::services::harvester::HarvestError;
use crate::services::uploader::UploadError;
use thiserror::Error;

/// Errors that abort a run before it can produce a summary
#[derive(Error, Debug)]
pub enum SnaggerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Harvest error: {0}")]
    Harvest(#[from] HarvestError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Harvest task panicked or was cancelled: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to serialize run summary: {0}")]
    Summary(#[from] serde_json::Error),
}

