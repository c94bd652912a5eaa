//! Test utilities for tsqlcore integration tests
//!
//! A [`Fixture`] wires a [`StatementExecutor`] to an in-memory metadata
//! service, scripted storage nodes and a scripted pipeline. The default
//! cluster has two nodes and one database `db0` with four partitions.

#![allow(dead_code)]

pub mod meta;
pub mod pipeline;
pub mod sink;
pub mod transport;

use meta::MemoryMeta;
use pipeline::{FakePipeline, NoopShardMapper};
use sink::CollectingSink;
use std::sync::Arc;
use std::time::Duration;
use transport::FakeTransport;
use tsqlcore::ast::Statement;
use tsqlcore::config::RetryConfig;
use tsqlcore::{
    CoordinatorConfig, ExecutionContext, ExecutionError, QueryResult, Series, StatementExecutor,
    Value,
};

pub const DB: &str = "db0";

pub struct Fixture {
    pub meta: Arc<MemoryMeta>,
    pub transport: Arc<FakeTransport>,
    pub pipeline: Arc<FakePipeline>,
    pub shard_mapper: Arc<NoopShardMapper>,
    pub sink: Arc<CollectingSink>,
    pub executor: StatementExecutor,
}

/// Retries that settle in milliseconds
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        retry: RetryConfig {
            dml_timeout: Duration::from_secs(2),
            dml_retry_interval: Duration::from_millis(1),
            select_retry_base: Duration::from_millis(1),
            ..RetryConfig::default()
        },
        ..CoordinatorConfig::default()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        tsqlcore::init_logging();
        let meta = Arc::new(MemoryMeta::new());
        meta.add_node(1, "node-1:8400");
        meta.add_node(2, "node-2:8400");
        meta.add_database(DB);
        meta.set_pt_view(DB, &[(0, 1), (1, 1), (2, 2), (3, 2)]);

        let transport = Arc::new(FakeTransport::new());
        let pipeline = Arc::new(FakePipeline::new());
        let shard_mapper = Arc::new(NoopShardMapper::default());
        let sink = Arc::new(CollectingSink::new());
        let executor = StatementExecutor::new(
            meta.clone(),
            transport.clone(),
            pipeline.clone(),
            shard_mapper.clone(),
            config,
        );
        Self {
            meta,
            transport,
            pipeline,
            shard_mapper,
            sink,
            executor,
        }
    }

    /// Context defaulting to `db0`
    pub fn ctx(&self) -> ExecutionContext {
        ExecutionContext::new(self.sink.clone()).with_database(DB)
    }

    /// Execute `stmt` as statement 0 and return what reached the sink
    pub async fn run(&self, stmt: Statement) -> Result<Vec<QueryResult>, ExecutionError> {
        self.run_with(stmt, &self.ctx()).await
    }

    pub async fn run_with(
        &self,
        stmt: Statement,
        ctx: &ExecutionContext,
    ) -> Result<Vec<QueryResult>, ExecutionError> {
        let result = self.executor.execute(&stmt, ctx, 0).await;
        let sent = self.sink.take();
        result.map(|_| sent)
    }

    /// Execute `stmt` and return the series of its single result
    pub async fn series(&self, stmt: Statement) -> Vec<Series> {
        let mut results = self.run(stmt).await.expect("statement failed");
        assert_eq!(results.len(), 1, "expected exactly one result");
        results.remove(0).series
    }
}

/// String cells of one column
pub fn column(series: &Series, index: usize) -> Vec<String> {
    series
        .values
        .iter()
        .map(|row| match &row[index] {
            Value::String(s) => s.clone(),
            other => format!("{:?}", other),
        })
        .collect()
}
