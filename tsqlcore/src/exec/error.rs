// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution error types

use crate::meta::MetaError;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("{0}")]
    Meta(MetaError),

    #[error("query not found: {0}")]
    QueryNotFound(u64),

    #[error("unsupported command")]
    Unsupported,

    #[error("invalid query")]
    InvalidQuery,

    #[error("invalid name")]
    InvalidName,

    #[error("database name required")]
    DatabaseNameRequired,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("{0} is not enabled")]
    FeatureDisabled(String),

    #[error("shard view changed: {0}")]
    ShardViewChanged(String),

    #[error("cluster not ready: {0}")]
    ClusterTransient(String),

    #[error("repeat mark delete: {0}")]
    DeleteInProgress(String),

    #[error("max message size exceeded: {0}")]
    MessageTooLarge(String),

    #[error("declare empty collection")]
    EmptyCollection,

    #[error("data type not supported: {0}")]
    DataTypeNotSupported(String),

    #[error("node {node_id} error: {message}")]
    Transport { node_id: u64, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("pipeline execution failed: {0}")]
    ExecutionFailed(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("query interrupted")]
    Cancelled,

    #[error("result sink closed")]
    SinkClosed,
}

impl ExecutionError {
    /// Not-found conditions caused by the client (reported as 4xx)
    pub fn is_not_found(&self) -> bool {
        match self {
            ExecutionError::QueryNotFound(_) => true,
            ExecutionError::Meta(meta) => meta.is_not_found(),
            _ => false,
        }
    }

    /// Errors counted against the client rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExecutionError::Meta(MetaError::DatabaseNotFound(_))
                | ExecutionError::Meta(MetaError::MeasurementNotFound(_))
        )
    }

    /// Transient errors caused by cluster topology changes or in-flight deletes
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutionError::ClusterTransient(_)
            | ExecutionError::ShardViewChanged(_)
            | ExecutionError::DeleteInProgress(_) => true,
            ExecutionError::Meta(meta) => meta.is_retryable(),
            _ => false,
        }
    }

    /// Retry class used while building a pipeline plan
    pub fn is_retryable_for_pipeline(&self) -> bool {
        self.is_retryable() || matches!(self, ExecutionError::MessageTooLarge(_))
    }

    /// Retry class for re-running a whole SELECT after a shard view change
    pub fn is_shard_view_transient(&self) -> bool {
        matches!(self, ExecutionError::ShardViewChanged(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }
}

impl From<MetaError> for ExecutionError {
    fn from(error: MetaError) -> Self {
        match error {
            MetaError::InvalidName => ExecutionError::InvalidName,
            other => ExecutionError::Meta(other),
        }
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(error: serde_json::Error) -> Self {
        ExecutionError::Decode(error.to_string())
    }
}

impl From<tokio::task::JoinError> for ExecutionError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            ExecutionError::Cancelled
        } else {
            ExecutionError::Internal(format!("task failed: {}", error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let not_found = ExecutionError::from(MetaError::DatabaseNotFound("db0".to_string()));
        assert!(not_found.is_not_found());
        assert!(not_found.is_client_error());
        assert!(!not_found.is_retryable());

        assert!(ExecutionError::QueryNotFound(3).is_not_found());
        assert!(!ExecutionError::QueryNotFound(3).is_client_error());

        let marked = ExecutionError::from(MetaError::DeleteInProgress("db0".to_string()));
        assert!(marked.is_retryable());

        let too_large = ExecutionError::MessageTooLarge("64MB".to_string());
        assert!(!too_large.is_retryable());
        assert!(too_large.is_retryable_for_pipeline());

        assert!(ExecutionError::ShardViewChanged("pt 3".to_string()).is_shard_view_transient());
        assert!(!ExecutionError::Unsupported.is_retryable());
        assert!(ExecutionError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_invalid_name_is_flattened() {
        assert_eq!(
            ExecutionError::from(MetaError::InvalidName),
            ExecutionError::InvalidName
        );
        assert_eq!(ExecutionError::Unsupported.to_string(), "unsupported command");
    }
}
