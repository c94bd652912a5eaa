// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-request execution context

use super::error::ExecutionError;
use super::result::QueryResult;
use super::sink::ResultSink;
use crate::ast::Privilege;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Database-level authorization, supplied by the HTTP layer
pub trait Authorizer: Send + Sync {
    fn authorize_database(&self, privilege: Privilege, database: &str) -> bool;
}

/// Authorizer used when authentication is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAuthorizer;

impl Authorizer for OpenAuthorizer {
    fn authorize_database(&self, _privilege: Privilege, _database: &str) -> bool {
        true
    }
}

/// Request level execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Node the request arrived on
    pub node_id: u64,
    /// Stream results in chunks of `chunk_size` rows
    pub chunked: bool,
    pub chunk_size: usize,
    /// Row batch size inside the pipeline
    pub inner_chunk_size: usize,
    pub query_limit_enabled: bool,
}

/// Everything a statement needs besides the statement itself
#[derive(Clone)]
pub struct ExecutionContext {
    pub query_id: u64,
    /// Default database of the request
    pub database: String,
    /// Default retention policy of the request
    pub retention_policy: String,
    pub read_only: bool,
    /// Fired when the client goes away or the query is killed
    pub cancel: CancellationToken,
    pub sink: Arc<dyn ResultSink>,
    pub authorizer: Arc<dyn Authorizer>,
    pub options: ExecutionOptions,
}

impl ExecutionContext {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self {
            query_id: 0,
            database: String::new(),
            retention_policy: String::new(),
            read_only: false,
            cancel: CancellationToken::new(),
            sink,
            authorizer: Arc::new(OpenAuthorizer),
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn with_retention_policy(mut self, retention_policy: &str) -> Self {
        self.retention_policy = retention_policy.to_string();
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// Deliver a result for statement `seq`
    pub async fn send(&self, result: QueryResult, seq: usize) -> Result<(), ExecutionError> {
        self.sink.send(result, seq).await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("query_id", &self.query_id)
            .field("database", &self.database)
            .field("retention_policy", &self.retention_policy)
            .field("read_only", &self.read_only)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("options", &self.options)
            .finish()
    }
}
