// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-node storage RPC capability and its reply types

use crate::ast::Expr;
use crate::exec::ExecutionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Run state of a query on one storage node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Killed,
}

/// A query running on one storage node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExeInfo {
    pub query_id: u64,
    pub stmt: String,
    pub database: String,
    /// Start time in unix nanoseconds
    pub begin_time: i64,
    pub run_state: RunState,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagSet {
    pub key: String,
    pub value: String,
}

impl TagSet {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Tag key/value pairs of one measurement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableTagSets {
    pub name: String,
    pub values: Vec<TagSet>,
}

/// Tag keys of one measurement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagKeys {
    pub name: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Unset or inverted ranges cover no time
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Estimated series count over one shard group time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityInfo {
    pub time_range: TimeRange,
    pub cardinality: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeasurementCardinalityInfo {
    pub name: String,
    pub infos: Vec<CardinalityInfo>,
}

/// Statement kinds a node tags its raw replies with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementMessageType {
    ShowMeasurements,
    ShowTagKeys,
    ShowTagValues,
    ShowSeriesCardinality,
    ShowMeasurementCardinality,
    ShowFieldKeys,
}

impl StatementMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementMessageType::ShowMeasurements => "ShowMeasurementsStatement",
            StatementMessageType::ShowTagKeys => "ShowTagKeysStatement",
            StatementMessageType::ShowTagValues => "ShowTagValuesStatement",
            StatementMessageType::ShowSeriesCardinality => "ShowSeriesCardinalityStatement",
            StatementMessageType::ShowMeasurementCardinality => {
                "ShowMeasurementCardinalityStatement"
            }
            StatementMessageType::ShowFieldKeys => "ShowFieldKeysStatement",
        }
    }
}

/// Raw JSON reply of one node to a metadata statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatementMessage {
    pub statement_type: StatementMessageType,
    #[serde(default)]
    pub result: Vec<u8>,
    /// Entries the node filtered out, same encoding as `result`
    #[serde(default)]
    pub filtered: Vec<u8>,
}

/// RPC surface of the storage nodes.
///
/// `pts` lists the partitions of `database` owned by `node_id`;
/// `measurements` are versioned measurement names.
#[async_trait]
pub trait StorageTransport: Send + Sync {
    async fn show_series(
        &self,
        node_id: u64,
        database: &str,
        pts: &[u32],
        measurements: &[String],
        condition: Option<&Expr>,
    ) -> Result<Vec<String>, ExecutionError>;

    async fn series_cardinality(
        &self,
        node_id: u64,
        database: &str,
        pts: &[u32],
        measurements: &[String],
        condition: Option<&Expr>,
    ) -> Result<Vec<MeasurementCardinalityInfo>, ExecutionError>;

    async fn series_exact_cardinality(
        &self,
        node_id: u64,
        database: &str,
        pts: &[u32],
        measurements: &[String],
        condition: Option<&Expr>,
    ) -> Result<BTreeMap<String, u64>, ExecutionError>;

    /// Values of the requested tag keys, per versioned measurement name
    async fn tag_values(
        &self,
        node_id: u64,
        database: &str,
        pts: &[u32],
        tag_keys: &BTreeMap<String, BTreeSet<String>>,
        condition: Option<&Expr>,
    ) -> Result<Vec<TableTagSets>, ExecutionError>;

    async fn queries_on_node(&self, node_id: u64) -> Result<Vec<QueryExeInfo>, ExecutionError>;

    /// Fails with [`ExecutionError::QueryNotFound`] when the node never saw the query
    async fn kill_query_on_node(&self, node_id: u64, query_id: u64)
        -> Result<(), ExecutionError>;
}
