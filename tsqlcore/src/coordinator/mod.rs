// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement coordinator
//!
//! [`StatementExecutor`] is the single entry point for parsed statements. It
//! decides per statement kind whether to act on cluster metadata, fan out to
//! storage nodes or stream a SELECT through the pipeline, and reconciles
//! per-node partial results before they reach the result sink.

mod aggregate;
mod ddl;
pub mod normalize;
pub mod queries;
mod retry;
mod select;
mod show;
pub mod stats;
mod statement_executor;
mod tag_values;

pub use normalize::normalize_statement;
pub use queries::{CombinedQueryExecInfo, QueryRunState};
pub use stats::{DatabaseStats, StatsSampler};

use crate::cluster::{MetaExecutor, StorageTransport};
use crate::config::CoordinatorConfig;
use crate::exec::{ExecutionError, Series};
use crate::meta::MetaClient;
use crate::pipeline::{PipelineExecutor, ShardMapper};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What a handler produced
pub(crate) enum Outcome {
    /// Rows for the single result the dispatcher sends
    Rows(Vec<Series>),
    /// The handler already sent its results
    Emitted,
}

impl Outcome {
    pub(crate) fn none() -> Self {
        Outcome::Rows(Vec::new())
    }
}

/// Statement failures split by who caused them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorCounts {
    pub client_errors: u64,
    pub server_errors: u64,
}

#[derive(Debug, Default)]
struct ErrorCounters {
    client: AtomicU64,
    server: AtomicU64,
}

impl ErrorCounters {
    fn record(&self, err: &ExecutionError) {
        if err.is_client_error() {
            self.client.fetch_add(1, Ordering::Relaxed);
        } else {
            self.server.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> ErrorCounts {
        ErrorCounts {
            client_errors: self.client.load(Ordering::Relaxed),
            server_errors: self.server.load(Ordering::Relaxed),
        }
    }
}

/// Executes parsed statements against the cluster
pub struct StatementExecutor {
    meta: Arc<dyn MetaClient>,
    meta_executor: MetaExecutor,
    transport: Arc<dyn StorageTransport>,
    pipeline: Arc<dyn PipelineExecutor>,
    shard_mapper: Arc<dyn ShardMapper>,
    config: CoordinatorConfig,
    errors: ErrorCounters,
}

impl StatementExecutor {
    pub fn new(
        meta: Arc<dyn MetaClient>,
        transport: Arc<dyn StorageTransport>,
        pipeline: Arc<dyn PipelineExecutor>,
        shard_mapper: Arc<dyn ShardMapper>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            meta_executor: MetaExecutor::new(meta.clone()),
            meta,
            transport,
            pipeline,
            shard_mapper,
            config,
            errors: ErrorCounters::default(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Failed SELECT statements so far, split into client and server errors
    pub fn error_counts(&self) -> ErrorCounts {
        self.errors.snapshot()
    }

    /// Release the shard mapper
    pub fn close(&self) -> Result<(), ExecutionError> {
        log::info!("closing statement executor");
        self.shard_mapper.close()
    }
}
