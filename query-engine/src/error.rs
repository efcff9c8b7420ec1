//! FILENAME: query-engine/src/error.rs

use thiserror::Error;
use data_model::ResourceType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainCreationError {
    #[error("Chain index {index} is outside the resolved chain of length {len}")]
    TargetOutOfChain { index: usize, len: usize },

    #[error("Path has {actual} positions, chain has {expected}")]
    PathLengthMismatch { expected: usize, actual: usize },

    #[error("Missing {action} permission on {resource_type:?} {resource_id}")]
    PermissionDenied {
        action: &'static str,
        resource_type: ResourceType,
        resource_id: String,
    },

    #[error("Record {record_id} not found in {resource_type:?} {resource_id}")]
    DanglingRecord {
        resource_type: ResourceType,
        resource_id: String,
        record_id: String,
    },
}
