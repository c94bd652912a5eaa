// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SELECT and EXPLAIN execution
//!
//! A SELECT moves through plan construction, streaming and draining. The
//! plan runs on its own task and pushes row batches into a channel; the
//! calling task forwards each batch to the sink until the channel closes or
//! the request is cancelled.

use super::retry::{retry_pipeline, select_backoff, sleep_or_cancel};
use super::StatementExecutor;
use crate::ast::{ExplainStatement, SelectStatement};
use crate::exec::{ExecutionContext, ExecutionError, QueryResult, Series, Value};
use crate::pipeline::{QueryPlan, RowBatch, SelectOptions};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Row batches buffered between the plan and the emit loop
const ROW_BATCH_BUFFER: usize = 16;

/// A running plan and the receiving end of its batch channel
struct PlanStream {
    plan: Arc<dyn QueryPlan>,
    rx: Option<mpsc::Receiver<RowBatch>>,
    exec: Option<JoinHandle<Result<(), ExecutionError>>>,
}

impl PlanStream {
    fn start(plan: Arc<dyn QueryPlan>) -> Self {
        let (tx, rx) = mpsc::channel(ROW_BATCH_BUFFER);
        let runner = plan.clone();
        let exec = tokio::spawn(async move { runner.execute(tx).await });
        Self {
            plan,
            rx: Some(rx),
            exec: Some(exec),
        }
    }

    /// Next batch, `None` once the plan closed its channel.
    ///
    /// Cancellation wins over a ready batch.
    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<RowBatch>, ExecutionError> {
        let rx = match self.rx.as_mut() {
            Some(rx) => rx,
            None => return Ok(None),
        };
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            batch = rx.recv() => Some(batch),
        };
        match received {
            Some(batch) => Ok(batch),
            None => {
                self.abort();
                Err(ExecutionError::Cancelled)
            }
        }
    }

    /// Abort the plan and keep draining its channel in the background so
    /// the producer never blocks on a full channel
    fn abort(&mut self) {
        self.plan.abort();
        if let (Some(rx), Some(exec)) = (self.rx.take(), self.exec.take()) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(drain(rx, exec));
            }
        }
    }

    /// Wait for the plan task once the channel is closed
    async fn finish(mut self) -> Result<(), ExecutionError> {
        self.rx.take();
        match self.exec.take() {
            Some(exec) => exec.await?,
            None => Ok(()),
        }
    }
}

impl Drop for PlanStream {
    fn drop(&mut self) {
        if self.rx.is_some() {
            self.abort();
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<RowBatch>, exec: JoinHandle<Result<(), ExecutionError>>) {
    let mut dropped = 0usize;
    while let Some(batch) = rx.recv().await {
        dropped += batch.row_count();
    }
    match exec.await {
        Ok(Err(err)) if !err.is_cancelled() => {
            log::debug!("aborted plan finished with error: {}", err)
        }
        _ => log::debug!("aborted plan drained, {} rows discarded", dropped),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<ExecutionError>() {
        err.to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

impl StatementExecutor {
    pub(super) fn select_options(&self, ctx: &ExecutionContext) -> SelectOptions {
        SelectOptions {
            node_id: ctx.options.node_id,
            max_series_n: self.config.max_select_series_n,
            max_fields_n: self.config.max_select_fields_n,
            max_point_n: self.config.max_select_point_n,
            max_buckets_n: self.config.max_select_buckets_n,
            max_query_mem: self.config.max_query_mem,
            max_query_parallel: self.config.max_query_parallel,
            query_time_compare_enabled: self.config.query_time_compare_enabled,
            chunked: ctx.options.chunked,
            chunk_size: ctx.options.chunk_size,
            inner_chunk_size: ctx.options.inner_chunk_size,
            query_limit_enabled: ctx.options.query_limit_enabled,
            authorizer: ctx.authorizer.clone(),
            abort: ctx.cancel.clone(),
        }
    }

    /// Ask the pipeline for a plan. This is the only panic boundary of the
    /// coordinator: a data type panic is returned as that error, anything
    /// else becomes an internal error.
    async fn create_plan(
        &self,
        stmt: &SelectStatement,
        options: &SelectOptions,
        query_id: u64,
    ) -> Result<Option<Arc<dyn QueryPlan>>, ExecutionError> {
        let build = self.pipeline.select(stmt, self.shard_mapper.clone(), options);
        match AssertUnwindSafe(build).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                if let Some(err @ ExecutionError::DataTypeNotSupported(_)) =
                    payload.downcast_ref::<ExecutionError>()
                {
                    return Err(err.clone());
                }
                let message = panic_message(payload.as_ref());
                log::error!(
                    "runtime panic in pipeline executor, query_id={}: {}",
                    query_id,
                    message
                );
                Err(ExecutionError::Internal(format!("runtime panic: {}", message)))
            }
        }
    }

    /// Build a plan, retrying transient failures. `None` means the statement
    /// covers no data.
    async fn build_plan(
        &self,
        stmt: &SelectStatement,
        options: &SelectOptions,
        ctx: &ExecutionContext,
    ) -> Result<Option<Arc<dyn QueryPlan>>, ExecutionError> {
        let result = retry_pipeline(&self.config.retry, &ctx.cancel, || {
            self.create_plan(stmt, options, ctx.query_id)
        })
        .await;
        match result {
            Err(ExecutionError::EmptyCollection) => Ok(None),
            Err(err) => {
                if !err.is_cancelled() {
                    log::error!("create pipeline executor failed for {}: {}", stmt, err);
                }
                Err(err)
            }
            ok => ok,
        }
    }

    /// Run a SELECT, re-running it from scratch while the shard view is
    /// changing and nothing has reached the sink yet
    pub(super) async fn execute_select_with_retry(
        &self,
        stmt: &SelectStatement,
        ctx: &ExecutionContext,
        seq: usize,
    ) -> Result<(), ExecutionError> {
        let policy = &self.config.retry;
        let mut emitted = false;
        let mut attempt = 0u32;
        loop {
            match self.execute_select(stmt, ctx, seq, &mut emitted).await {
                Err(err)
                    if err.is_shard_view_transient()
                        && !emitted
                        && attempt + 1 < policy.select_max_attempts =>
                {
                    let backoff = select_backoff(policy.select_retry_base, attempt);
                    log::warn!(
                        "select attempt {} hit a shard view change, retrying in {:?}: {}",
                        attempt + 1,
                        backoff,
                        err
                    );
                    sleep_or_cancel(backoff, &ctx.cancel).await?;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn execute_select(
        &self,
        stmt: &SelectStatement,
        ctx: &ExecutionContext,
        seq: usize,
        emitted: &mut bool,
    ) -> Result<(), ExecutionError> {
        let start = Instant::now();
        let mut stmt = stmt.clone();
        stmt.omit_time = true;

        let options = self.select_options(ctx);
        let plan = match self.build_plan(&stmt, &options, ctx).await? {
            Some(plan) => plan,
            None => {
                ctx.send(QueryResult::empty(), seq).await?;
                *emitted = true;
                return Ok(());
            }
        };
        let built = start.elapsed();

        let mut stream = PlanStream::start(plan);
        loop {
            let batch = match stream.next(&ctx.cancel).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    log::info!("query {} aborted by user: {}", ctx.query_id, stmt);
                    return Err(err);
                }
            };
            let result = QueryResult {
                series: batch.series,
                partial: batch.partial,
                ..Default::default()
            };
            if let Err(err) = ctx.send(result, seq).await {
                stream.abort();
                log::error!("send result rows failed: {}", err);
                return Err(err);
            }
            *emitted = true;
        }

        if let Err(err) = stream.finish().await {
            log::error!("pipeline execute failed: {}", err);
            return Err(err);
        }
        log::debug!(
            "query {} built in {:?}, emitted in {:?}",
            ctx.query_id,
            built,
            start.elapsed().saturating_sub(built)
        );

        if !*emitted {
            ctx.send(QueryResult::empty(), seq).await?;
            *emitted = true;
        }
        Ok(())
    }

    /// EXPLAIN: the plan description without running it
    pub(super) async fn execute_explain(
        &self,
        explain: &ExplainStatement,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Series>, ExecutionError> {
        if explain.analyze {
            return self.execute_explain_analyze(explain, ctx).await;
        }
        let mut stmt = explain.statement.clone();
        stmt.omit_time = true;
        let options = self.select_options(ctx);
        let mut series = Series::new("", &["QUERY PLAN"]);
        match self.create_plan(&stmt, &options, ctx.query_id).await {
            Ok(Some(plan)) => {
                for line in plan.describe() {
                    series.push_row(vec![Value::from(line)]);
                }
            }
            Ok(None) | Err(ExecutionError::EmptyCollection) => {}
            Err(err) => return Err(err),
        }
        Ok(vec![series])
    }

    /// EXPLAIN ANALYZE: run the plan, count rows and report a phase trace
    async fn execute_explain_analyze(
        &self,
        explain: &ExplainStatement,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Series>, ExecutionError> {
        let mut stmt = explain.statement.clone();
        stmt.omit_time = true;
        let options = self.select_options(ctx);

        let mut trace = vec![
            "SELECT".to_string(),
            format!("├── statement: EXPLAIN ANALYZE {}", stmt),
        ];

        let started = Instant::now();
        let plan = self.create_plan(&stmt, &options, ctx.query_id).await;
        let build_time = started.elapsed();
        let plan = match plan {
            Ok(Some(plan)) => plan,
            Ok(None) | Err(ExecutionError::EmptyCollection) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        trace.push("├── create_pipeline_executor".to_string());
        trace.push(format!("│   └── duration: {:?}", build_time));

        let emit_started = Instant::now();
        let mut rows = 0usize;
        let mut stream = PlanStream::start(plan);
        while let Some(batch) = stream.next(&ctx.cancel).await? {
            rows += batch.row_count();
        }
        if let Err(err) = stream.finish().await {
            log::error!("pipeline execute failed: {}", err);
            return Err(err);
        }
        trace.push("└── emit".to_string());
        trace.push(format!("    ├── row_count: {}", rows));
        trace.push(format!("    └── duration: {:?}", emit_started.elapsed()));

        let mut series = Series::new("", &["EXPLAIN ANALYZE"]);
        for line in trace {
            series.push_row(vec![Value::from(line)]);
        }
        Ok(vec![series])
    }
}
