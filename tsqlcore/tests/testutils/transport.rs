//! Scripted storage nodes

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tsqlcore::ast::Expr;
use tsqlcore::cluster::*;
use tsqlcore::meta::origin_measurement_name;
use tsqlcore::ExecutionError;

/// What one node answers
#[derive(Default)]
pub struct NodeScript {
    pub series: Vec<String>,
    pub cardinality: Vec<MeasurementCardinalityInfo>,
    pub exact: BTreeMap<String, u64>,
    pub tag_values: Vec<TableTagSets>,
    pub queries: Vec<QueryExeInfo>,
    pub killable: BTreeSet<u64>,
    /// Returned by every call while set
    pub error: Option<ExecutionError>,
    /// Shard view changes reported before the node answers
    pub transient: usize,
}

#[derive(Default)]
pub struct FakeTransport {
    nodes: Mutex<BTreeMap<u64, NodeScript>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, node_id: u64, f: impl FnOnce(&mut NodeScript)) {
        f(self.nodes.lock().entry(node_id).or_default());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply<T>(
        &self,
        node_id: u64,
        f: impl FnOnce(&NodeScript) -> T,
    ) -> Result<T, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.nodes.lock();
        let script = nodes.entry(node_id).or_default();
        if script.transient > 0 {
            script.transient -= 1;
            return Err(ExecutionError::ShardViewChanged(format!("node {}", node_id)));
        }
        if let Some(err) = &script.error {
            return Err(err.clone());
        }
        Ok(f(script))
    }
}

fn requested(measurements: &[String], name: &str) -> bool {
    measurements
        .iter()
        .any(|m| m == name || origin_measurement_name(m) == name)
}

#[async_trait]
impl StorageTransport for FakeTransport {
    async fn show_series(
        &self,
        node_id: u64,
        _database: &str,
        _pts: &[u32],
        measurements: &[String],
        _condition: Option<&Expr>,
    ) -> Result<Vec<String>, ExecutionError> {
        self.reply(node_id, |script| {
            script
                .series
                .iter()
                .filter(|key| {
                    let name = key.split(',').next().unwrap_or_default();
                    requested(measurements, name)
                })
                .cloned()
                .collect()
        })
    }

    async fn series_cardinality(
        &self,
        node_id: u64,
        _database: &str,
        _pts: &[u32],
        measurements: &[String],
        _condition: Option<&Expr>,
    ) -> Result<Vec<MeasurementCardinalityInfo>, ExecutionError> {
        self.reply(node_id, |script| {
            script
                .cardinality
                .iter()
                .filter(|m| requested(measurements, &m.name))
                .cloned()
                .collect()
        })
    }

    async fn series_exact_cardinality(
        &self,
        node_id: u64,
        _database: &str,
        _pts: &[u32],
        measurements: &[String],
        _condition: Option<&Expr>,
    ) -> Result<BTreeMap<String, u64>, ExecutionError> {
        self.reply(node_id, |script| {
            script
                .exact
                .iter()
                .filter(|(name, _)| requested(measurements, name))
                .map(|(name, n)| (name.clone(), *n))
                .collect()
        })
    }

    async fn tag_values(
        &self,
        node_id: u64,
        _database: &str,
        _pts: &[u32],
        tag_keys: &BTreeMap<String, BTreeSet<String>>,
        _condition: Option<&Expr>,
    ) -> Result<Vec<TableTagSets>, ExecutionError> {
        self.reply(node_id, |script| {
            script
                .tag_values
                .iter()
                .filter_map(|table| {
                    let keys = tag_keys.get(&table.name)?;
                    Some(TableTagSets {
                        name: table.name.clone(),
                        values: table
                            .values
                            .iter()
                            .filter(|tv| keys.contains(&tv.key))
                            .cloned()
                            .collect(),
                    })
                })
                .collect()
        })
    }

    async fn queries_on_node(&self, node_id: u64) -> Result<Vec<QueryExeInfo>, ExecutionError> {
        self.reply(node_id, |script| script.queries.clone())
    }

    async fn kill_query_on_node(&self, node_id: u64, query_id: u64) -> Result<(), ExecutionError> {
        self.reply(node_id, |script| script.killable.contains(&query_id))
            .and_then(|found| {
                if found {
                    Ok(())
                } else {
                    Err(ExecutionError::QueryNotFound(query_id))
                }
            })
    }
}
