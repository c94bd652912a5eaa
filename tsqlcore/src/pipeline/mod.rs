// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query pipeline capability
//!
//! The coordinator never evaluates a SELECT itself. It asks a
//! [`PipelineExecutor`] for a [`QueryPlan`], runs the plan and forwards the
//! row batches it produces to the result sink.

use crate::ast::SelectStatement;
use crate::exec::{Authorizer, ExecutionError, Series};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One batch of rows emitted by a running plan
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowBatch {
    pub series: Vec<Series>,
    /// More batches follow for the last series
    pub partial: bool,
}

impl RowBatch {
    pub fn new(series: Vec<Series>) -> Self {
        Self {
            series,
            partial: false,
        }
    }

    pub fn row_count(&self) -> usize {
        self.series.iter().map(|s| s.values.len()).sum()
    }
}

/// Limits and switches handed to the pipeline for one SELECT
#[derive(Clone)]
pub struct SelectOptions {
    pub node_id: u64,
    pub max_series_n: usize,
    pub max_fields_n: usize,
    pub max_point_n: usize,
    pub max_buckets_n: usize,
    pub max_query_mem: u64,
    pub max_query_parallel: usize,
    pub query_time_compare_enabled: bool,
    pub chunked: bool,
    pub chunk_size: usize,
    pub inner_chunk_size: usize,
    pub query_limit_enabled: bool,
    pub authorizer: Arc<dyn Authorizer>,
    /// Fired to abort plan construction and execution
    pub abort: CancellationToken,
}

impl std::fmt::Debug for SelectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectOptions")
            .field("node_id", &self.node_id)
            .field("max_series_n", &self.max_series_n)
            .field("max_point_n", &self.max_point_n)
            .field("max_query_parallel", &self.max_query_parallel)
            .field("chunked", &self.chunked)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// Maps measurements to the shards a plan reads from
pub trait ShardMapper: Send + Sync {
    /// Release cached shard mappings; called when the executor shuts down
    fn close(&self) -> Result<(), ExecutionError>;
}

/// An executable SELECT plan
#[async_trait]
pub trait QueryPlan: Send + Sync {
    /// Run the plan, pushing row batches into `tx` until done.
    ///
    /// A send failure means the consumer went away; the plan should stop.
    async fn execute(&self, tx: mpsc::Sender<RowBatch>) -> Result<(), ExecutionError>;

    /// Stop a running plan; `execute` returns soon after
    fn abort(&self);

    /// Human readable plan, one line per entry
    fn describe(&self) -> Vec<String>;
}

/// Builds query plans
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Build a plan for `stmt`.
    ///
    /// `Ok(None)` means the statement covers no data. Implementations signal
    /// an empty source collection with [`ExecutionError::EmptyCollection`];
    /// both cases produce an empty result. Building a plan may panic with an
    /// [`ExecutionError::DataTypeNotSupported`] payload.
    async fn select(
        &self,
        stmt: &SelectStatement,
        shard_mapper: Arc<dyn ShardMapper>,
        options: &SelectOptions,
    ) -> Result<Option<Arc<dyn QueryPlan>>, ExecutionError>;

    /// Rewrite and type check a SELECT without building a plan
    async fn prepare(
        &self,
        stmt: &SelectStatement,
        shard_mapper: Arc<dyn ShardMapper>,
        options: &SelectOptions,
    ) -> Result<SelectStatement, ExecutionError>;
}
