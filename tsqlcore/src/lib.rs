// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! tsqlcore - statement coordination for a distributed time-series SQL node
//!
//! Parsed statements enter through [`StatementExecutor::execute`]. Each kind
//! either acts on cluster metadata, fans out to the storage nodes owning a
//! database, or streams a SELECT through the pipeline executor. Per-node
//! replies are merged into one deterministic answer before they reach the
//! caller's result sink.
//!
//! # Usage
//!
//! ```ignore
//! let executor = StatementExecutor::new(meta, transport, pipeline, shard_mapper, config);
//! let (sink, mut results) = ChannelSink::new(16);
//! let ctx = ExecutionContext::new(Arc::new(sink)).with_database("db0");
//! executor.execute(&stmt, &ctx, 0).await?;
//! ```
//!
//! The metadata service, storage transport and pipeline executor are
//! supplied by the embedding node through the [`MetaClient`],
//! [`StorageTransport`] and [`PipelineExecutor`] traits.

pub mod ast;
pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod exec;
pub mod merge;
pub mod meta;
pub mod pipeline;

pub use cluster::{MetaExecutor, StorageTransport};
pub use config::CoordinatorConfig;
pub use coordinator::{normalize_statement, DatabaseStats, StatementExecutor, StatsSampler};
pub use exec::{ExecutionContext, ExecutionError, QueryResult, ResultSink, Series, Value};
pub use meta::{MetaClient, MetaError};
pub use pipeline::{PipelineExecutor, QueryPlan, ShardMapper};

use once_cell::sync::OnceCell;

/// tsqlcore version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static LOGGER: OnceCell<()> = OnceCell::new();

/// Install the `env_logger` backend, honouring `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logging() {
    LOGGER.get_or_init(|| {
        let _ = env_logger::Builder::from_default_env()
            .format_timestamp_millis()
            .try_init();
    });
}
