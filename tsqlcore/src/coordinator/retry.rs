// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Retry policies
//!
//! Shard and metadata topology converge eventually across nodes, so a
//! statement issued during a topology change retries transient failures
//! within a wall-clock budget instead of surfacing them.

use crate::config::RetryConfig;
use crate::exec::ExecutionError;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Sleep for `interval`, returning early with `Cancelled` if the token fires
pub(crate) async fn sleep_or_cancel(
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), ExecutionError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}

/// Backoff before pre-execution SELECT attempt `attempt` (0-based)
pub(crate) fn select_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Retry `attempt` while it fails with a retryable error and the budget lasts.
///
/// Used for DROP statements and read aggregation. Non-retryable errors end
/// the loop at once; the final error is logged before it is returned.
pub(crate) async fn retry_dml<T, F, Fut>(
    policy: &RetryConfig,
    what: &str,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ExecutionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExecutionError>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || start.elapsed() >= policy.dml_timeout {
            log::error!("{} failed after {} attempt(s): {}", what, attempts, err);
            return Err(err);
        }
        log::debug!("{} attempt {} failed, retrying: {}", what, attempts, err);
        sleep_or_cancel(policy.dml_retry_interval, cancel).await?;
    }
}

/// Retry pipeline plan construction.
///
/// Also retries oversized messages, and warns every
/// `pipeline_warn_every` failed attempts.
pub(crate) async fn retry_pipeline<T, F, Fut>(
    policy: &RetryConfig,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ExecutionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExecutionError>>,
{
    let start = Instant::now();
    let mut retries = 0u32;
    loop {
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable_for_pipeline() || start.elapsed() >= policy.dml_timeout {
            return Err(err);
        }
        retries += 1;
        if retries % policy.pipeline_warn_every.max(1) == 0 {
            log::warn!(
                "pipeline construction still failing after {} retries: {}",
                retries,
                err
            );
        }
        sleep_or_cancel(policy.dml_retry_interval, cancel).await?;
    }
}
