//! FILENAME: pivot-engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pivot configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported pivot configuration version: {0}")]
    UnsupportedVersion(String),
}
