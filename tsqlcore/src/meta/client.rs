// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Metadata service capability

use super::error::MetaError;
use super::types::*;
use crate::ast::{Expr, MeasurementRef, Privilege, SelectStatement};
use std::collections::{BTreeMap, BTreeSet};

/// Authoritative store for databases, retention policies, users and shard layout.
///
/// Reads are served from the node's synchronized copy of the metadata, so the
/// trait is synchronous. Writes go through the metadata leader and return once
/// committed.
pub trait MetaClient: Send + Sync {
    // Cluster layout
    fn data_nodes(&self) -> Result<Vec<DataNode>, MetaError>;
    fn db_pt_view(&self, database: &str) -> Result<Vec<PtOwner>, MetaError>;

    // Databases
    fn databases(&self) -> Vec<DatabaseInfo>;
    fn database(&self, name: &str) -> Result<DatabaseInfo, MetaError>;
    fn create_database(
        &self,
        name: &str,
        enable_tag_array: bool,
        replicas: u32,
    ) -> Result<DatabaseInfo, MetaError>;
    fn create_database_with_retention_policy(
        &self,
        name: &str,
        spec: &RetentionPolicySpec,
        shard_key: &ShardKeyInfo,
        enable_tag_array: bool,
        replicas: u32,
    ) -> Result<DatabaseInfo, MetaError>;
    fn mark_database_delete(&self, name: &str) -> Result<(), MetaError>;

    // Retention policies
    fn retention_policy(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Option<RetentionPolicyInfo>, MetaError>;
    fn create_retention_policy(
        &self,
        database: &str,
        spec: &RetentionPolicySpec,
        make_default: bool,
    ) -> Result<RetentionPolicyInfo, MetaError>;
    fn update_retention_policy(
        &self,
        database: &str,
        name: &str,
        update: &RetentionPolicyUpdate,
        make_default: bool,
    ) -> Result<(), MetaError>;
    fn mark_retention_policy_delete(&self, database: &str, name: &str) -> Result<(), MetaError>;

    // Measurements
    fn measurement(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
    ) -> Result<MeasurementInfo, MetaError>;
    /// Origin names of the measurements matching an optional source
    fn measurements(
        &self,
        database: &str,
        source: Option<&MeasurementRef>,
    ) -> Result<Vec<String>, MetaError>;
    /// Measurements matching the sources; all of them when `sources` is empty
    fn match_measurements(
        &self,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<Vec<MeasurementInfo>, MetaError>;
    fn create_measurement(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        spec: &MeasurementSpec,
    ) -> Result<MeasurementInfo, MetaError>;
    fn alter_shard_key(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        shard_key: &ShardKeyInfo,
    ) -> Result<(), MetaError>;
    fn mark_measurement_delete(&self, database: &str, name: &str) -> Result<(), MetaError>;
    /// Field columns per measurement
    fn field_keys(
        &self,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<BTreeMap<String, BTreeMap<String, ColumnType>>, MetaError>;
    /// Tag keys per versioned measurement name
    fn query_tag_keys(
        &self,
        database: &str,
        sources: &[MeasurementRef],
        condition: Option<&Expr>,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, MetaError>;
    fn update_stream_mst_schema(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        select: &SelectStatement,
    ) -> Result<(), MetaError>;

    // Continuous queries and subscriptions
    fn create_continuous_query(&self, database: &str, name: &str, query: &str)
        -> Result<(), MetaError>;
    fn drop_continuous_query(&self, name: &str, database: &str) -> Result<(), MetaError>;
    fn create_subscription(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
        mode: &str,
        destinations: &[String],
    ) -> Result<(), MetaError>;
    fn drop_subscription(
        &self,
        database: &str,
        retention_policy: &str,
        name: &str,
    ) -> Result<(), MetaError>;

    // Users
    fn users(&self) -> Vec<UserInfo>;
    fn create_user(
        &self,
        name: &str,
        password: &str,
        admin: bool,
        rwuser: bool,
    ) -> Result<UserInfo, MetaError>;
    fn update_user(&self, name: &str, password: &str) -> Result<(), MetaError>;
    fn drop_user(&self, name: &str) -> Result<(), MetaError>;
    fn set_privilege(&self, user: &str, database: &str, privilege: Privilege)
        -> Result<(), MetaError>;
    fn set_admin_privilege(&self, user: &str, admin: bool) -> Result<(), MetaError>;
    fn user_privilege(&self, user: &str, database: &str) -> Result<Privilege, MetaError>;
    fn user_privileges(&self, user: &str) -> Result<BTreeMap<String, Privilege>, MetaError>;

    // Downsample policies
    fn new_downsample_policy(
        &self,
        database: &str,
        retention_policy: &str,
        info: &DownSamplePolicyInfo,
    ) -> Result<(), MetaError>;
    fn drop_downsample_policy(
        &self,
        database: &str,
        retention_policy: &str,
        drop_all: bool,
    ) -> Result<(), MetaError>;

    // Streams
    fn streams(&self) -> Vec<StreamInfo>;
    fn create_stream_policy(&self, info: &StreamInfo) -> Result<(), MetaError>;
    fn drop_stream(&self, name: &str) -> Result<(), MetaError>;
}
