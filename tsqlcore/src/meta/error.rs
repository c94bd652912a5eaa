// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Metadata service errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetaError {
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("retention policy not found: {0}")]
    RetentionPolicyNotFound(String),

    #[error("measurement not found: {0}")]
    MeasurementNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("continuous query not found: {0}")]
    ContinuousQueryNotFound(String),

    #[error("stream not found: {0}")]
    StreamNotFound(String),

    #[error("downsample policy not found: {0}")]
    DownSamplePolicyNotFound(String),

    #[error("downsample policy exists")]
    DownSamplePolicyExists,

    #[error("invalid name")]
    InvalidName,

    #[error("invalid shard key: {0}")]
    InvalidShardKey(String),

    /// The target is already marked for deletion and still being removed
    #[error("repeat mark delete: {0}")]
    DeleteInProgress(String),

    /// Leader election or a membership change is in progress
    #[error("meta service not ready: {0}")]
    NotReady(String),

    #[error("{0}")]
    Conflict(String),

    #[error("meta error: {0}")]
    Other(String),
}

impl MetaError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetaError::DatabaseNotFound(_)
                | MetaError::RetentionPolicyNotFound(_)
                | MetaError::MeasurementNotFound(_)
                | MetaError::UserNotFound(_)
                | MetaError::ContinuousQueryNotFound(_)
                | MetaError::StreamNotFound(_)
                | MetaError::DownSamplePolicyNotFound(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MetaError::DeleteInProgress(_) | MetaError::NotReady(_))
    }
}
