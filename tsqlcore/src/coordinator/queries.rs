// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Running-query registry view
//!
//! Every storage node reports the queries it is executing. The same query id
//! shows up once per node, so reports are folded into one entry per id with
//! the hosts split into those still running it and those that killed it.

use super::StatementExecutor;
use crate::ast::KillQueryStatement;
use crate::cluster::{QueryExeInfo, RunState};
use crate::exec::{ExecutionError, Series, Value};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Run state of a query across every host that reported it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRunState {
    AllRunning,
    PartiallyKilled,
    AllKilled,
}

/// One logical query as seen by the whole cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedQueryExecInfo {
    pub query_id: u64,
    pub stmt: String,
    pub database: String,
    /// Earliest begin time reported by any host, unix nanoseconds
    pub begin_time: i64,
    pub running_hosts: BTreeSet<String>,
    pub killed_hosts: BTreeSet<String>,
}

impl CombinedQueryExecInfo {
    pub fn new(info: &QueryExeInfo, host: &str) -> Self {
        let mut combined = Self {
            query_id: info.query_id,
            stmt: info.stmt.clone(),
            database: info.database.clone(),
            begin_time: info.begin_time,
            running_hosts: BTreeSet::new(),
            killed_hosts: BTreeSet::new(),
        };
        combined.update_hosts(host, info.run_state);
        combined
    }

    pub fn update_begin_time(&mut self, begin_time: i64) {
        self.begin_time = self.begin_time.min(begin_time);
    }

    /// Record the state a host reported, moving it between the host sets
    pub fn update_hosts(&mut self, host: &str, state: RunState) {
        match state {
            RunState::Killed => {
                self.running_hosts.remove(host);
                self.killed_hosts.insert(host.to_string());
            }
            RunState::Running => {
                self.killed_hosts.remove(host);
                self.running_hosts.insert(host.to_string());
            }
        }
    }

    pub fn run_state(&self) -> QueryRunState {
        if self.running_hosts.is_empty() {
            QueryRunState::AllKilled
        } else if self.killed_hosts.is_empty() {
            QueryRunState::AllRunning
        } else {
            QueryRunState::PartiallyKilled
        }
    }

    fn output_row(&self, killed: bool, now: i64) -> Vec<Value> {
        let (status, hosts) = if killed {
            ("killed", &self.killed_hosts)
        } else {
            ("running", &self.running_hosts)
        };
        let elapsed = u64::try_from(now.saturating_sub(self.begin_time)).unwrap_or(0);
        vec![
            Value::from(self.query_id),
            self.stmt.clone().into(),
            self.database.clone().into(),
            format_elapsed(Duration::from_nanos(elapsed)).into(),
            status.into(),
            hosts.iter().cloned().collect::<Vec<_>>().join(", ").into(),
        ]
    }
}

/// Fold one host's report into `combined`.
///
/// A report whose statement differs from the entry under the same id comes
/// from a query id reused after a restart; it replaces the entry only when
/// it began later.
pub fn combine_query_exe_infos(
    combined: &mut BTreeMap<u64, CombinedQueryExecInfo>,
    infos: &[QueryExeInfo],
    host: &str,
) {
    for info in infos {
        if let Some(existing) = combined.get_mut(&info.query_id) {
            if existing.stmt == info.stmt {
                existing.update_begin_time(info.begin_time);
                existing.update_hosts(host, info.run_state);
                continue;
            }
            if info.begin_time <= existing.begin_time {
                continue;
            }
        }
        combined.insert(info.query_id, CombinedQueryExecInfo::new(info, host));
    }
}

/// SHOW QUERIES rows ordered by begin time. Fully killed queries are hidden,
/// partially killed ones get a killed row before their running row.
pub fn query_rows<'a, I>(combined: I, now: i64) -> Vec<Vec<Value>>
where
    I: IntoIterator<Item = &'a CombinedQueryExecInfo>,
{
    let mut sorted: Vec<&CombinedQueryExecInfo> = combined.into_iter().collect();
    sorted.sort_by_key(|info| (info.begin_time, info.query_id));

    let mut rows = Vec::with_capacity(sorted.len());
    for info in sorted {
        match info.run_state() {
            QueryRunState::AllKilled => continue,
            QueryRunState::PartiallyKilled => rows.push(info.output_row(true, now)),
            QueryRunState::AllRunning => {}
        }
        rows.push(info.output_row(false, now));
    }
    rows
}

/// Render an elapsed time like `1h2m3s`, `150ms` or `12µs`.
///
/// Truncated to the largest unit it reaches, so `3.456s` renders as `3s`.
pub fn format_elapsed(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", nanos / 1_000);
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", nanos / 1_000_000);
    }
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}s", secs));
    out
}

impl StatementExecutor {
    pub(super) async fn show_queries(&self) -> Result<Vec<Series>, ExecutionError> {
        let nodes = self.meta.data_nodes()?;
        let reports = join_all(nodes.iter().map(|node| async move {
            match self.transport.queries_on_node(node.id).await {
                Ok(infos) => infos,
                Err(err) => {
                    log::warn!("get queries on node {} failed: {}", node.id, err);
                    Vec::new()
                }
            }
        }))
        .await;

        let mut combined = BTreeMap::new();
        for (node, infos) in nodes.iter().zip(reports) {
            combine_query_exe_infos(&mut combined, &infos, &node.host);
        }

        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let rows = query_rows(combined.values(), now);
        Ok(vec![Series::new(
            "",
            &["qid", "query", "database", "duration", "status", "host"],
        )
        .with_rows(rows)])
    }

    /// Kill a query on every node. Fails only when every node reported the
    /// query unknown; other node failures are logged and tolerated.
    pub(super) async fn kill_query(&self, stmt: &KillQueryStatement) -> Result<(), ExecutionError> {
        if !stmt.host.is_empty() {
            return Err(ExecutionError::Unsupported);
        }
        let nodes = self.meta.data_nodes()?;
        let replies = join_all(
            nodes
                .iter()
                .map(|node| self.transport.kill_query_on_node(node.id, stmt.query_id)),
        )
        .await;

        let mut not_found = 0usize;
        for (node, reply) in nodes.iter().zip(replies) {
            match reply {
                Ok(()) => {}
                Err(ExecutionError::QueryNotFound(_)) => not_found += 1,
                Err(err) => {
                    log::warn!("kill query {} on node {} failed: {}", stmt.query_id, node.id, err)
                }
            }
        }
        if not_found == nodes.len() {
            return Err(ExecutionError::QueryNotFound(stmt.query_id));
        }
        Ok(())
    }
}
