// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Info objects returned by the metadata service

use super::validate::origin_measurement_name;
use crate::ast::{
    CreateDownSampleStatement, CreateStreamStatement, DownSampleCall, Expr, Privilege,
    SelectStatement,
};
use crate::exec::ExecutionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A storage node of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNode {
    pub id: u64,
    pub host: String,
}

/// Ownership of one database partition (PT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtOwner {
    pub pt_id: u32,
    pub node_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EngineType {
    #[default]
    TsStore,
    ColumnStore,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::TsStore => "tsstore",
            EngineType::ColumnStore => "columnstore",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tsstore" => Some(EngineType::TsStore),
            "columnstore" => Some(EngineType::ColumnStore),
            _ => None,
        }
    }
}

/// Data type of a measurement column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Tag,
    Integer,
    Float,
    Boolean,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Tag => "tag",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::String => "string",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tag" => Some(ColumnType::Tag),
            "int64" | "integer" => Some(ColumnType::Integer),
            "float64" | "float" => Some(ColumnType::Float),
            "bool" | "boolean" => Some(ColumnType::Boolean),
            "string" => Some(ColumnType::String),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShardKeyInfo {
    pub shard_key: Vec<String>,
    pub shard_type: String,
    pub shard_group: u64,
}

/// Secondary index kinds a measurement may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Text,
    Field,
    TimeCluster,
}

impl IndexKind {
    pub fn from_name(name: &str) -> Result<Self, ExecutionError> {
        match name.to_ascii_lowercase().as_str() {
            "text" => Ok(IndexKind::Text),
            "field" => Ok(IndexKind::Field),
            "timecluster" => Ok(IndexKind::TimeCluster),
            _ => Err(ExecutionError::InvalidInput(format!(
                "invalid index type {}",
                name
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexRelation {
    pub kinds: Vec<IndexKind>,
    pub index_lists: Vec<Vec<String>>,
}

/// Column store layout of a measurement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColStoreInfo {
    pub primary_key: Vec<String>,
    pub sort_key: Vec<String>,
    pub property_key: Vec<String>,
    pub property_value: Vec<String>,
}

/// Everything needed to create a measurement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementSpec {
    pub shard_key: ShardKeyInfo,
    pub index_relation: IndexRelation,
    pub engine_type: EngineType,
    pub col_store: Option<ColStoreInfo>,
    pub schema: BTreeMap<String, ColumnType>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementInfo {
    /// Stored name including the version suffix
    pub name: String,
    pub shard_keys: Vec<ShardKeyInfo>,
    pub engine_type: EngineType,
    pub index_relation: IndexRelation,
    pub col_store: Option<ColStoreInfo>,
    pub schema: BTreeMap<String, ColumnType>,
    pub marked_deleted: bool,
}

impl MeasurementInfo {
    pub fn origin_name(&self) -> &str {
        origin_measurement_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub id: u64,
    /// Partitions holding a copy of the shard
    pub owners: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardGroupInfo {
    pub id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub shards: Vec<ShardInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub name: String,
    pub mode: String,
    pub destinations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContinuousQueryInfo {
    pub name: String,
    pub query: String,
}

/// Downsample policy attached to a retention policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownSamplePolicyInfo {
    pub calls: Vec<DownSampleCall>,
    pub duration: Duration,
    pub sample_interval: Vec<Duration>,
    pub time_interval: Vec<Duration>,
}

const DOWNSAMPLE_FUNCTIONS: [&str; 7] = ["min", "max", "sum", "count", "mean", "first", "last"];

impl DownSamplePolicyInfo {
    /// Build and check a policy for the given retention policy
    pub fn from_statement(
        stmt: &CreateDownSampleStatement,
        rp: &RetentionPolicyInfo,
    ) -> Result<Self, ExecutionError> {
        if stmt.ops.is_empty() {
            return Err(ExecutionError::InvalidInput(
                "downsample requires at least one aggregation".to_string(),
            ));
        }
        for op in &stmt.ops {
            if !DOWNSAMPLE_FUNCTIONS.contains(&op.function.to_ascii_lowercase().as_str()) {
                return Err(ExecutionError::InvalidInput(format!(
                    "unsupported downsample function {}",
                    op.function
                )));
            }
        }
        if stmt.sample_interval.is_empty() || stmt.sample_interval.len() != stmt.time_interval.len() {
            return Err(ExecutionError::InvalidInput(
                "sample interval and time interval must have the same length".to_string(),
            ));
        }
        if stmt.sample_interval.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ExecutionError::InvalidInput(
                "sample intervals must be increasing".to_string(),
            ));
        }
        let duration = if stmt.duration.is_zero() {
            rp.duration
        } else {
            stmt.duration
        };
        if let Some(last) = stmt.sample_interval.last() {
            if !duration.is_zero() && *last >= duration {
                return Err(ExecutionError::InvalidInput(
                    "sample interval must be less than the retention duration".to_string(),
                ));
            }
        }
        Ok(Self {
            calls: stmt.ops.clone(),
            duration,
            sample_interval: stmt.sample_interval.clone(),
            time_interval: stmt.time_interval.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetentionPolicyInfo {
    pub name: String,
    pub replica_n: u32,
    pub duration: Duration,
    pub shard_group_duration: Duration,
    pub hot_duration: Duration,
    pub warm_duration: Duration,
    pub index_group_duration: Duration,
    pub shard_groups: Vec<ShardGroupInfo>,
    /// Keyed by origin measurement name
    pub measurements: BTreeMap<String, MeasurementInfo>,
    pub subscriptions: Vec<SubscriptionInfo>,
    pub downsample: Option<DownSamplePolicyInfo>,
    pub marked_deleted: bool,
}

impl RetentionPolicyInfo {
    pub fn has_downsample_policy(&self) -> bool {
        self.downsample.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub default_retention_policy: String,
    pub retention_policies: BTreeMap<String, RetentionPolicyInfo>,
    pub continuous_queries: Vec<ContinuousQueryInfo>,
    pub replica_n: u32,
    pub enable_tag_array: bool,
    pub shard_key: ShardKeyInfo,
    pub marked_deleted: bool,
}

impl DatabaseInfo {
    pub fn retention_policy(&self, name: &str) -> Option<&RetentionPolicyInfo> {
        self.retention_policies.get(name)
    }
}

/// Retention policy to create
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetentionPolicySpec {
    pub name: String,
    pub duration: Option<Duration>,
    pub replica_n: Option<u32>,
    pub shard_group_duration: Duration,
    pub hot_duration: Option<Duration>,
    pub warm_duration: Option<Duration>,
    pub index_group_duration: Duration,
}

/// Changes applied by ALTER RETENTION POLICY; `None` keeps the current value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetentionPolicyUpdate {
    pub duration: Option<Duration>,
    pub replica_n: Option<u32>,
    pub shard_group_duration: Option<Duration>,
    pub hot_duration: Option<Duration>,
    pub warm_duration: Option<Duration>,
    pub index_group_duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub admin: bool,
    pub rwuser: bool,
    pub privileges: BTreeMap<String, Privilege>,
}

/// One aggregation maintained by a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCall {
    pub call: String,
    pub field: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub src_database: String,
    pub src_retention_policy: String,
    pub src_measurement: String,
    pub des_database: String,
    pub des_retention_policy: String,
    pub des_measurement: String,
    pub dimensions: Vec<String>,
    pub calls: Vec<StreamCall>,
    pub interval: Duration,
    pub delay: Duration,
}

impl StreamInfo {
    /// Describe a stream from its statement and the prepared source SELECT
    pub fn new(stmt: &CreateStreamStatement, select: &SelectStatement) -> Self {
        let (src_database, src_retention_policy, src_measurement) = match select.sources.first() {
            Some(src) => (
                src.database.clone(),
                src.retention_policy.clone(),
                src.name.clone(),
            ),
            None => Default::default(),
        };
        let dimensions = select
            .dimensions
            .iter()
            .filter_map(|d| match d {
                Expr::VarRef(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        let calls = select
            .fields
            .iter()
            .filter_map(|f| match &f.expr {
                Expr::Call { name, args } => {
                    let field = match args.first() {
                        Some(Expr::VarRef(field)) => field.clone(),
                        _ => String::new(),
                    };
                    let alias = f
                        .alias
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", name.to_ascii_lowercase(), field));
                    Some(StreamCall {
                        call: name.to_ascii_lowercase(),
                        field,
                        alias,
                    })
                }
                _ => None,
            })
            .collect();
        Self {
            name: stmt.name.clone(),
            src_database,
            src_retention_policy,
            src_measurement,
            des_database: stmt.target.database.clone(),
            des_retention_policy: stmt.target.retention_policy.clone(),
            des_measurement: stmt.target.name.clone(),
            dimensions,
            calls,
            interval: select.group_by_interval(),
            delay: stmt.delay,
        }
    }
}
