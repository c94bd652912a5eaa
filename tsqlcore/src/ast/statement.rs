// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parsed statement model
//!
//! Statements arrive from the parser fully formed. Every statement kind is a
//! variant of [`Statement`] so the dispatcher can match exhaustively.

use super::expr::Expr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Privilege levels granted on a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Privilege {
    #[default]
    NoPrivileges,
    Read,
    Write,
    All,
}

impl Privilege {
    fn bits(self) -> u8 {
        match self {
            Privilege::NoPrivileges => 0b00,
            Privilege::Read => 0b01,
            Privilege::Write => 0b10,
            Privilege::All => 0b11,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Privilege::Read,
            0b10 => Privilege::Write,
            0b11 => Privilege::All,
            _ => Privilege::NoPrivileges,
        }
    }

    /// Clear the bits of `revoked` from this privilege
    pub fn without(self, revoked: Privilege) -> Privilege {
        Privilege::from_bits(self.bits() & !revoked.bits())
    }

    /// Whether this privilege includes `other`
    pub fn includes(self, other: Privilege) -> bool {
        self.bits() & other.bits() == other.bits()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::NoPrivileges => "NO PRIVILEGES",
            Privilege::Read => "READ",
            Privilege::Write => "WRITE",
            Privilege::All => "ALL PRIVILEGES",
        }
    }
}

/// Literal value of a SET CONFIG statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

/// Measurement reference in FROM / INTO clauses
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementRef {
    pub database: String,
    pub retention_policy: String,
    pub name: String,
    pub regex: Option<String>,
    pub is_target: bool,
}

impl MeasurementRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// One projected field of a SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectField {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectStatement {
    pub fields: Vec<SelectField>,
    pub target: Option<MeasurementRef>,
    pub sources: Vec<MeasurementRef>,
    pub condition: Option<Expr>,
    pub dimensions: Vec<Expr>,
    pub limit: usize,
    pub offset: usize,
    pub slimit: usize,
    pub soffset: usize,
    /// Hide the time column in emitted rows
    pub omit_time: bool,
}

impl SelectStatement {
    /// The `GROUP BY time(...)` interval, zero when there is none
    pub fn group_by_interval(&self) -> Duration {
        self.dimensions
            .iter()
            .find_map(|dim| match dim {
                Expr::Call { name, args } if name.eq_ignore_ascii_case("time") => {
                    match args.first() {
                        Some(Expr::DurationLit(d)) => Some(*d),
                        _ => None,
                    }
                }
                _ => None,
            })
            .unwrap_or(Duration::ZERO)
    }

    /// Names of the functions called by projected fields
    pub fn call_names(&self) -> Vec<String> {
        fn collect(expr: &Expr, out: &mut Vec<String>) {
            match expr {
                Expr::Call { name, args } => {
                    out.push(name.to_ascii_lowercase());
                    args.iter().for_each(|a| collect(a, out));
                }
                Expr::Binary { lhs, rhs, .. } => {
                    collect(lhs, out);
                    collect(rhs, out);
                }
                Expr::Paren(inner) => collect(inner, out),
                _ => {}
            }
        }
        let mut names = Vec::new();
        for field in &self.fields {
            collect(&field.expr, &mut names);
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlterRetentionPolicyStatement {
    pub name: String,
    pub database: String,
    pub duration: Option<Duration>,
    pub shard_group_duration: Option<Duration>,
    pub hot_duration: Option<Duration>,
    pub warm_duration: Option<Duration>,
    pub index_group_duration: Option<Duration>,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlterShardKeyStatement {
    pub database: String,
    pub retention_policy: String,
    pub name: String,
    pub shard_key: Vec<String>,
    pub shard_type: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateDatabaseStatement {
    pub name: String,
    pub retention_policy_create: bool,
    pub retention_policy_name: String,
    pub retention_policy_duration: Option<Duration>,
    pub retention_policy_replication: Option<u32>,
    pub retention_policy_shard_group_duration: Duration,
    pub retention_policy_hot_duration: Duration,
    pub retention_policy_warm_duration: Duration,
    pub retention_policy_index_group_duration: Duration,
    pub shard_key: Vec<String>,
    pub enable_tag_array: bool,
    pub replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateMeasurementStatement {
    pub database: String,
    pub retention_policy: String,
    pub name: String,
    pub shard_key: Vec<String>,
    pub shard_type: String,
    pub index_type: Vec<String>,
    pub index_list: Vec<Vec<String>>,
    pub engine_type: String,
    pub primary_key: Vec<String>,
    pub sort_key: Vec<String>,
    pub property_keys: Vec<String>,
    pub property_values: Vec<String>,
    /// Declared tag columns (name -> type)
    pub tags: BTreeMap<String, String>,
    /// Declared field columns (name -> type)
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateRetentionPolicyStatement {
    pub name: String,
    pub database: String,
    pub duration: Duration,
    pub shard_group_duration: Duration,
    pub hot_duration: Duration,
    pub warm_duration: Duration,
    pub index_group_duration: Duration,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateSubscriptionStatement {
    pub name: String,
    pub database: String,
    pub retention_policy: String,
    pub destinations: Vec<String>,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateContinuousQueryStatement {
    pub name: String,
    pub database: String,
    pub source: SelectStatement,
    pub resample_every: Duration,
    pub resample_for: Duration,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DropContinuousQueryStatement {
    pub name: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateUserStatement {
    pub name: String,
    pub password: String,
    pub admin: bool,
    pub rwuser: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesFilterStatement {
    pub sources: Vec<MeasurementRef>,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DropRetentionPolicyStatement {
    pub name: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DropSubscriptionStatement {
    pub name: String,
    pub database: String,
    pub retention_policy: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplainStatement {
    pub statement: SelectStatement,
    pub analyze: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrivilegeStatement {
    pub privilege: Privilege,
    pub on: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowMeasurementKeysStatement {
    /// PRIMARYKEY, SORTKEY, PROPERTY, SHARDKEY, ENGINETYPE or SCHEMA
    pub name: String,
    pub database: String,
    pub retention_policy: String,
    pub measurement: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowMeasurementsStatement {
    pub database: String,
    pub source: Option<MeasurementRef>,
    pub condition: Option<Expr>,
    pub limit: usize,
    pub offset: usize,
}

/// Shared shape of the SHOW ... CARDINALITY statements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardinalityStatement {
    pub database: String,
    pub sources: Vec<MeasurementRef>,
    pub condition: Option<Expr>,
    pub exact: bool,
    pub dimensions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowFieldKeysStatement {
    pub database: String,
    pub sources: Vec<MeasurementRef>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowTagKeysStatement {
    pub database: String,
    pub sources: Vec<MeasurementRef>,
    pub condition: Option<Expr>,
    pub limit: usize,
    pub offset: usize,
}

/// Tag key selector of SHOW TAG VALUES ... WITH KEY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagKeyFilter {
    Eq(String),
    Neq(String),
    In(Vec<String>),
    Regex(String),
    NotRegex(String),
}

impl Default for TagKeyFilter {
    fn default() -> Self {
        TagKeyFilter::Regex(".*".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowTagValuesStatement {
    pub database: String,
    pub sources: Vec<MeasurementRef>,
    pub tag_key: TagKeyFilter,
    pub condition: Option<Expr>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowTagValuesCardinalityStatement {
    pub database: String,
    pub sources: Vec<MeasurementRef>,
    pub tag_key: TagKeyFilter,
    pub condition: Option<Expr>,
    pub exact: bool,
    pub dimensions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShowSeriesStatement {
    pub database: String,
    pub sources: Vec<MeasurementRef>,
    pub condition: Option<Expr>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KillQueryStatement {
    pub query_id: u64,
    pub host: String,
}

/// One aggregation of a downsample policy, e.g. `sum(integer)`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownSampleCall {
    pub function: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateDownSampleStatement {
    pub db_name: String,
    pub rp_name: String,
    pub ops: Vec<DownSampleCall>,
    pub duration: Duration,
    pub sample_interval: Vec<Duration>,
    pub time_interval: Vec<Duration>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DropDownSampleStatement {
    pub db_name: String,
    pub rp_name: String,
    pub drop_all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStreamStatement {
    pub name: String,
    pub target: MeasurementRef,
    pub query: Box<Statement>,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetConfigStatement {
    pub component: String,
    pub key: String,
    pub value: Literal,
}

/// Every statement kind the coordinator can be handed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    AlterRetentionPolicy(AlterRetentionPolicyStatement),
    AlterShardKey(AlterShardKeyStatement),
    CreateDatabase(CreateDatabaseStatement),
    CreateMeasurement(CreateMeasurementStatement),
    CreateRetentionPolicy(CreateRetentionPolicyStatement),
    CreateSubscription(CreateSubscriptionStatement),
    CreateContinuousQuery(CreateContinuousQueryStatement),
    ShowContinuousQueries,
    DropContinuousQuery(DropContinuousQueryStatement),
    CreateUser(CreateUserStatement),
    DeleteSeries(SeriesFilterStatement),
    DropDatabase { name: String },
    DropMeasurement { name: String },
    DropSeries(SeriesFilterStatement),
    DropRetentionPolicy(DropRetentionPolicyStatement),
    DropShard { id: u64 },
    DropSubscription(DropSubscriptionStatement),
    DropUser { name: String },
    Explain(ExplainStatement),
    Grant(PrivilegeStatement),
    GrantAdmin { user: String },
    Revoke(PrivilegeStatement),
    RevokeAdmin { user: String },
    ShowDatabases { show_detail: bool },
    ShowDiagnostics { module: String },
    ShowGrantsForUser { name: String },
    ShowMeasurementKeys(ShowMeasurementKeysStatement),
    ShowMeasurements(ShowMeasurementsStatement),
    ShowMeasurementCardinality(CardinalityStatement),
    ShowRetentionPolicies { database: String },
    ShowSeriesCardinality(CardinalityStatement),
    ShowShards,
    ShowShardGroups,
    ShowSubscriptions,
    ShowFieldKeys(ShowFieldKeysStatement),
    ShowFieldKeyCardinality(CardinalityStatement),
    ShowTagKeys(ShowTagKeysStatement),
    ShowTagKeyCardinality(CardinalityStatement),
    ShowTagValues(ShowTagValuesStatement),
    ShowSeries(ShowSeriesStatement),
    ShowTagValuesCardinality(ShowTagValuesCardinalityStatement),
    ShowUsers,
    SetPasswordUser { name: String, password: String },
    ShowQueries,
    KillQuery(KillQueryStatement),
    PrepareSnapshot,
    EndPrepareSnapshot,
    GetRuntimeInfo,
    CreateDownSample(CreateDownSampleStatement),
    DropDownSample(DropDownSampleStatement),
    ShowDownSample { db_name: String },
    CreateStream(CreateStreamStatement),
    ShowStreams { database: String },
    DropStream { name: String },
    ShowConfigs,
    SetConfig(SetConfigStatement),
    ShowStats { module: String },
    Select(SelectStatement),
}

impl Statement {
    /// Statements that change cluster metadata and get a read-only advisory
    /// when run from a read-only context
    pub fn mutates_metadata(&self) -> bool {
        matches!(
            self,
            Statement::AlterRetentionPolicy(_)
                | Statement::AlterShardKey(_)
                | Statement::CreateDatabase(_)
                | Statement::CreateMeasurement(_)
                | Statement::CreateRetentionPolicy(_)
                | Statement::CreateContinuousQuery(_)
                | Statement::DropContinuousQuery(_)
                | Statement::CreateUser(_)
                | Statement::DropDatabase { .. }
                | Statement::DropMeasurement { .. }
                | Statement::DropRetentionPolicy(_)
                | Statement::DropSubscription(_)
                | Statement::DropUser { .. }
                | Statement::Grant(_)
                | Statement::GrantAdmin { .. }
                | Statement::Revoke(_)
                | Statement::RevokeAdmin { .. }
                | Statement::SetPasswordUser { .. }
                | Statement::CreateDownSample(_)
                | Statement::DropDownSample(_)
                | Statement::CreateStream(_)
        )
    }

    /// Short kind name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::AlterRetentionPolicy(_) => "ALTER RETENTION POLICY",
            Statement::AlterShardKey(_) => "ALTER SHARDKEY",
            Statement::CreateDatabase(_) => "CREATE DATABASE",
            Statement::CreateMeasurement(_) => "CREATE MEASUREMENT",
            Statement::CreateRetentionPolicy(_) => "CREATE RETENTION POLICY",
            Statement::CreateSubscription(_) => "CREATE SUBSCRIPTION",
            Statement::CreateContinuousQuery(_) => "CREATE CONTINUOUS QUERY",
            Statement::ShowContinuousQueries => "SHOW CONTINUOUS QUERIES",
            Statement::DropContinuousQuery(_) => "DROP CONTINUOUS QUERY",
            Statement::CreateUser(_) => "CREATE USER",
            Statement::DeleteSeries(_) => "DELETE",
            Statement::DropDatabase { .. } => "DROP DATABASE",
            Statement::DropMeasurement { .. } => "DROP MEASUREMENT",
            Statement::DropSeries(_) => "DROP SERIES",
            Statement::DropRetentionPolicy(_) => "DROP RETENTION POLICY",
            Statement::DropShard { .. } => "DROP SHARD",
            Statement::DropSubscription(_) => "DROP SUBSCRIPTION",
            Statement::DropUser { .. } => "DROP USER",
            Statement::Explain(_) => "EXPLAIN",
            Statement::Grant(_) => "GRANT",
            Statement::GrantAdmin { .. } => "GRANT ALL PRIVILEGES",
            Statement::Revoke(_) => "REVOKE",
            Statement::RevokeAdmin { .. } => "REVOKE ALL PRIVILEGES",
            Statement::ShowDatabases { .. } => "SHOW DATABASES",
            Statement::ShowDiagnostics { .. } => "SHOW DIAGNOSTICS",
            Statement::ShowGrantsForUser { .. } => "SHOW GRANTS",
            Statement::ShowMeasurementKeys(_) => "SHOW MEASUREMENT KEYS",
            Statement::ShowMeasurements(_) => "SHOW MEASUREMENTS",
            Statement::ShowMeasurementCardinality(_) => "SHOW MEASUREMENT CARDINALITY",
            Statement::ShowRetentionPolicies { .. } => "SHOW RETENTION POLICIES",
            Statement::ShowSeriesCardinality(_) => "SHOW SERIES CARDINALITY",
            Statement::ShowShards => "SHOW SHARDS",
            Statement::ShowShardGroups => "SHOW SHARD GROUPS",
            Statement::ShowSubscriptions => "SHOW SUBSCRIPTIONS",
            Statement::ShowFieldKeys(_) => "SHOW FIELD KEYS",
            Statement::ShowFieldKeyCardinality(_) => "SHOW FIELD KEY CARDINALITY",
            Statement::ShowTagKeys(_) => "SHOW TAG KEYS",
            Statement::ShowTagKeyCardinality(_) => "SHOW TAG KEY CARDINALITY",
            Statement::ShowTagValues(_) => "SHOW TAG VALUES",
            Statement::ShowSeries(_) => "SHOW SERIES",
            Statement::ShowTagValuesCardinality(_) => "SHOW TAG VALUES CARDINALITY",
            Statement::ShowUsers => "SHOW USERS",
            Statement::SetPasswordUser { .. } => "SET PASSWORD",
            Statement::ShowQueries => "SHOW QUERIES",
            Statement::KillQuery(_) => "KILL QUERY",
            Statement::PrepareSnapshot => "PREPARE SNAPSHOT",
            Statement::EndPrepareSnapshot => "END PREPARE SNAPSHOT",
            Statement::GetRuntimeInfo => "GET RUNTIMEINFO",
            Statement::CreateDownSample(_) => "CREATE DOWNSAMPLE",
            Statement::DropDownSample(_) => "DROP DOWNSAMPLE",
            Statement::ShowDownSample { .. } => "SHOW DOWNSAMPLE",
            Statement::CreateStream(_) => "CREATE STREAM",
            Statement::ShowStreams { .. } => "SHOW STREAMS",
            Statement::DropStream { .. } => "DROP STREAM",
            Statement::ShowConfigs => "SHOW CONFIGS",
            Statement::SetConfig(_) => "SET CONFIG",
            Statement::ShowStats { .. } => "SHOW STATS",
            Statement::Select(_) => "SELECT",
        }
    }
}
