// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-database statistics sampling

use super::StatementExecutor;
use crate::exec::ExecutionError;
use crate::merge::merge_cardinality_flat;
use serde::{Deserialize, Serialize};

/// Number of calls between two full refreshes
pub const DEFAULT_REFRESH_EVERY: u32 = 30;

/// Measurement and series counts of one database
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub database: String,
    pub measurements: usize,
    /// Series of the newest shard group time range
    pub recent_series: u64,
    /// Series of the time range before it
    pub history_series: u64,
}

/// Cadence and last snapshot of statistics collection, owned by the caller
#[derive(Debug, Clone)]
pub struct StatsSampler {
    refresh_every: u32,
    calls: u32,
    snapshot: Vec<DatabaseStats>,
}

impl Default for StatsSampler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_EVERY)
    }
}

impl StatsSampler {
    pub fn new(refresh_every: u32) -> Self {
        Self {
            refresh_every: refresh_every.max(1),
            calls: 0,
            snapshot: Vec::new(),
        }
    }

    /// Whether this call recomputes; advances the cadence
    fn tick(&mut self) -> bool {
        let refresh = self.calls == 0;
        self.calls = (self.calls + 1) % self.refresh_every;
        refresh
    }

    pub fn snapshot(&self) -> &[DatabaseStats] {
        &self.snapshot
    }
}

impl StatementExecutor {
    /// Database statistics, recomputed on the sampler's cadence and served
    /// from its last snapshot otherwise
    pub async fn statistics(
        &self,
        sampler: &mut StatsSampler,
    ) -> Result<Vec<DatabaseStats>, ExecutionError> {
        if !sampler.tick() {
            return Ok(sampler.snapshot.clone());
        }

        let mut stats = Vec::new();
        for db in self.meta.databases() {
            let measurements = self.meta.match_measurements(&db.name, &[])?;
            let names: Vec<String> = measurements.iter().map(|m| m.name.clone()).collect();
            let replies = self
                .series_cardinality_replies(&db.name, &names, None)
                .await?;
            let ranges = merge_cardinality_flat(replies);
            let mut newest = ranges.iter().rev().map(|info| info.cardinality);
            let recent_series = newest.next().unwrap_or(0);
            let history_series = newest.next().unwrap_or(0);
            stats.push(DatabaseStats {
                database: db.name,
                measurements: measurements.len(),
                recent_series,
                history_series,
            });
        }
        log::debug!("collected statistics of {} databases", stats.len());
        sampler.snapshot = stats.clone();
        Ok(stats)
    }
}
