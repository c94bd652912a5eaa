// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Metadata changing statements

use super::StatementExecutor;
use crate::ast::{
    AlterRetentionPolicyStatement, AlterShardKeyStatement, CreateContinuousQueryStatement,
    CreateDatabaseStatement, CreateDownSampleStatement, CreateMeasurementStatement,
    CreateRetentionPolicyStatement, CreateStreamStatement, DropDownSampleStatement,
    DropRetentionPolicyStatement, Literal, PrivilegeStatement, Privilege, SetConfigStatement,
    Statement,
};
use crate::exec::{ExecutionContext, ExecutionError};
use crate::meta::{
    valid_measurement_name, valid_name, valid_shard_key, ColStoreInfo, ColumnType,
    DownSamplePolicyInfo, EngineType, IndexKind, IndexRelation, MeasurementSpec, MetaError,
    RetentionPolicySpec, RetentionPolicyUpdate, ShardKeyInfo, StreamInfo,
};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Aggregations a stream can maintain incrementally
const STREAM_CALLS: [&str; 4] = ["min", "max", "sum", "count"];

impl StatementExecutor {
    fn retention_policy_count(&self) -> usize {
        self.meta
            .databases()
            .iter()
            .map(|db| db.retention_policies.len())
            .sum()
    }

    fn check_retention_policy_limit(&self, database: &str) -> Result<(), ExecutionError> {
        if self.retention_policy_count() >= self.config.retention_policy_limit {
            log::error!("exceeds the rp limit, db={}", database);
            return Err(ExecutionError::LimitExceeded(
                "THE TOTAL NUMBER OF RPs EXCEEDS THE LIMIT".to_string(),
            ));
        }
        Ok(())
    }

    pub(super) fn create_database(&self, stmt: &CreateDatabaseStatement) -> Result<(), ExecutionError> {
        if !valid_name(&stmt.name) {
            return Err(ExecutionError::InvalidName);
        }
        log::info!("create database {}", stmt.name);
        self.check_retention_policy_limit(&stmt.name)?;

        if !stmt.retention_policy_create {
            let result =
                self.meta
                    .create_database(&stmt.name, stmt.enable_tag_array, stmt.replicas);
            log::info!("create database {} finished: {:?}", stmt.name, result.as_ref().err());
            return result.map(|_| ()).map_err(Into::into);
        }

        // WITH DURATION 1d alone leaves the RP name empty
        if !stmt.retention_policy_name.is_empty() && !valid_name(&stmt.retention_policy_name) {
            return Err(ExecutionError::InvalidName);
        }
        valid_shard_key(&stmt.shard_key)?;

        let spec = RetentionPolicySpec {
            name: stmt.retention_policy_name.clone(),
            duration: stmt.retention_policy_duration,
            replica_n: stmt.retention_policy_replication,
            shard_group_duration: stmt.retention_policy_shard_group_duration,
            hot_duration: Some(stmt.retention_policy_hot_duration),
            warm_duration: Some(stmt.retention_policy_warm_duration),
            index_group_duration: stmt.retention_policy_index_group_duration,
        };
        let shard_key = ShardKeyInfo {
            shard_key: stmt.shard_key.clone(),
            ..Default::default()
        };
        self.meta.create_database_with_retention_policy(
            &stmt.name,
            &spec,
            &shard_key,
            stmt.enable_tag_array,
            stmt.replicas,
        )?;
        log::info!("create database {} with rp finished", stmt.name);
        Ok(())
    }

    pub(super) fn create_retention_policy(
        &self,
        stmt: &CreateRetentionPolicyStatement,
    ) -> Result<(), ExecutionError> {
        if !valid_name(&stmt.name) {
            return Err(ExecutionError::InvalidName);
        }
        self.check_retention_policy_limit(&stmt.database)?;
        let spec = RetentionPolicySpec {
            name: stmt.name.clone(),
            duration: Some(stmt.duration),
            replica_n: Some(1),
            shard_group_duration: stmt.shard_group_duration,
            hot_duration: Some(stmt.hot_duration),
            warm_duration: Some(stmt.warm_duration),
            index_group_duration: stmt.index_group_duration,
        };
        self.meta
            .create_retention_policy(&stmt.database, &spec, stmt.default)?;
        Ok(())
    }

    pub(super) fn alter_retention_policy(
        &self,
        stmt: &AlterRetentionPolicyStatement,
    ) -> Result<(), ExecutionError> {
        let rp = self
            .meta
            .retention_policy(&stmt.database, &stmt.name)?
            .ok_or_else(|| MetaError::RetentionPolicyNotFound(stmt.name.clone()))?;
        if let Some(duration) = stmt.duration {
            if rp.has_downsample_policy() && rp.duration != duration {
                return Err(MetaError::DownSamplePolicyExists.into());
            }
        }
        let update = RetentionPolicyUpdate {
            duration: stmt.duration,
            replica_n: Some(1),
            shard_group_duration: stmt.shard_group_duration,
            hot_duration: stmt.hot_duration,
            warm_duration: stmt.warm_duration,
            index_group_duration: stmt.index_group_duration,
        };
        self.meta
            .update_retention_policy(&stmt.database, &stmt.name, &update, stmt.default)?;
        Ok(())
    }

    pub(super) fn create_measurement(
        &self,
        stmt: &CreateMeasurementStatement,
    ) -> Result<(), ExecutionError> {
        if !valid_measurement_name(&stmt.name) {
            return Err(ExecutionError::InvalidName);
        }
        valid_shard_key(&stmt.shard_key)?;
        log::info!("create measurement {}", stmt.name);

        let mut index_relation = IndexRelation::default();
        if !stmt.index_list.is_empty() {
            for (i, index_type) in stmt.index_type.iter().enumerate() {
                let kind = IndexKind::from_name(index_type)?;
                let columns = stmt.index_list.get(i).map(Vec::len).unwrap_or(0);
                if kind == IndexKind::Field && columns > 1 {
                    return Err(ExecutionError::InvalidInput(format!(
                        "cannot create field index for multiple columns: {:?}",
                        stmt.index_list[i]
                    )));
                }
                index_relation.kinds.push(kind);
            }
        }
        index_relation.index_lists = stmt.index_list.clone();

        let engine_type = if stmt.engine_type.is_empty() {
            EngineType::default()
        } else {
            EngineType::parse(&stmt.engine_type).ok_or_else(|| {
                ExecutionError::InvalidInput(format!(
                    "ENGINETYPE \"{}\" IS NOT SUPPORTED!",
                    stmt.engine_type
                ))
            })?
        };

        let mut schema = BTreeMap::new();
        for tag in stmt.tags.keys() {
            schema.insert(tag.clone(), ColumnType::Tag);
        }
        for (field, type_name) in &stmt.fields {
            let column_type = ColumnType::parse(type_name).ok_or_else(|| {
                ExecutionError::InvalidInput(format!(
                    "invalid data type {} for field {}",
                    type_name, field
                ))
            })?;
            schema.insert(field.clone(), column_type);
        }

        let col_store = (engine_type == EngineType::ColumnStore).then(|| ColStoreInfo {
            primary_key: stmt.primary_key.clone(),
            sort_key: stmt.sort_key.clone(),
            property_key: stmt.property_keys.clone(),
            property_value: stmt.property_values.clone(),
        });

        let spec = MeasurementSpec {
            shard_key: ShardKeyInfo {
                shard_key: stmt.shard_key.clone(),
                shard_type: stmt.shard_type.clone(),
                shard_group: 0,
            },
            index_relation,
            engine_type,
            col_store,
            schema,
        };
        self.meta
            .create_measurement(&stmt.database, &stmt.retention_policy, &stmt.name, &spec)?;
        Ok(())
    }

    pub(super) fn alter_shard_key(&self, stmt: &AlterShardKeyStatement) -> Result<(), ExecutionError> {
        valid_shard_key(&stmt.shard_key)?;
        let shard_key = ShardKeyInfo {
            shard_key: stmt.shard_key.clone(),
            shard_type: stmt.shard_type.clone(),
            shard_group: 0,
        };
        self.meta.alter_shard_key(
            &stmt.database,
            &stmt.retention_policy,
            &stmt.name,
            &shard_key,
        )?;
        Ok(())
    }

    /// Mark a database deleted; storage reclaims it in the background.
    /// Dropping a missing database succeeds.
    pub(super) fn drop_database(&self, name: &str) -> Result<(), ExecutionError> {
        log::info!("mark delete database {} start", name);
        match self.meta.mark_database_delete(name) {
            Ok(()) => Ok(()),
            Err(MetaError::DatabaseNotFound(_)) => Ok(()),
            Err(err) => {
                log::error!("mark delete database {} failed: {}", name, err);
                Err(err.into())
            }
        }
    }

    pub(super) fn drop_measurement(&self, database: &str, name: &str) -> Result<(), ExecutionError> {
        self.meta.database(database)?;
        self.meta.mark_measurement_delete(database, name)?;
        Ok(())
    }

    /// Dropping a missing database or retention policy succeeds
    pub(super) fn drop_retention_policy(
        &self,
        stmt: &DropRetentionPolicyStatement,
    ) -> Result<(), ExecutionError> {
        log::info!("start delete rp {}.{}", stmt.database, stmt.name);
        let db = match self.meta.database(&stmt.database) {
            Ok(db) => db,
            Err(_) => return Ok(()),
        };
        if db.retention_policy(&stmt.name).is_none() {
            return Ok(());
        }
        if let Err(err) = self.meta.mark_retention_policy_delete(&stmt.database, &stmt.name) {
            log::error!("mark delete rp {}.{} failed: {}", stmt.database, stmt.name, err);
            return Err(err.into());
        }
        log::info!("delete rp {}.{} succeeded", stmt.database, stmt.name);
        Ok(())
    }

    pub(super) fn create_continuous_query(
        &self,
        stmt: &CreateContinuousQueryStatement,
    ) -> Result<(), ExecutionError> {
        let mut stmt = stmt.clone();
        stmt.source.condition = match &stmt.source.condition {
            Some(cond) => cond.strip_time_condition()?,
            None => None,
        };
        validate_continuous_query(&stmt)?;
        let query = Statement::CreateContinuousQuery(stmt.clone()).to_string();
        self.meta
            .create_continuous_query(&stmt.database, &stmt.name, &query)?;
        Ok(())
    }

    pub(super) fn drop_continuous_query(&self, name: &str, database: &str) -> Result<(), ExecutionError> {
        log::info!("delete continuous query {} on {}", name, database);
        if let Err(err) = self.meta.drop_continuous_query(name, database) {
            log::error!("delete continuous query {} on {} failed: {}", name, database, err);
            return Err(err.into());
        }
        Ok(())
    }

    pub(super) fn check_subscription_enabled(&self) -> Result<(), ExecutionError> {
        if self.config.subscription_enabled {
            Ok(())
        } else {
            Err(ExecutionError::FeatureDisabled("subscription".to_string()))
        }
    }

    pub(super) fn revoke(&self, stmt: &PrivilegeStatement) -> Result<(), ExecutionError> {
        let privilege = if stmt.privilege == Privilege::All {
            Privilege::NoPrivileges
        } else {
            self.meta
                .user_privilege(&stmt.user, &stmt.on)?
                .without(stmt.privilege)
        };
        self.meta.set_privilege(&stmt.user, &stmt.on, privilege)?;
        Ok(())
    }

    pub(super) fn create_downsample(
        &self,
        stmt: &CreateDownSampleStatement,
    ) -> Result<(), ExecutionError> {
        if !valid_name(&stmt.db_name) {
            return Err(ExecutionError::InvalidName);
        }
        log::info!("create downsample on {}.{}", stmt.db_name, stmt.rp_name);
        let rp = self
            .meta
            .retention_policy(&stmt.db_name, &stmt.rp_name)?
            .ok_or_else(|| MetaError::RetentionPolicyNotFound(stmt.rp_name.clone()))?;
        let info = DownSamplePolicyInfo::from_statement(stmt, &rp)?;
        if let Some(existing) = &rp.downsample {
            if *existing == info {
                return Ok(());
            }
            return Err(MetaError::DownSamplePolicyExists.into());
        }
        self.meta
            .new_downsample_policy(&stmt.db_name, &rp.name, &info)?;
        Ok(())
    }

    pub(super) fn drop_downsample(&self, stmt: &DropDownSampleStatement) -> Result<(), ExecutionError> {
        if !valid_name(&stmt.db_name) {
            return Err(ExecutionError::InvalidName);
        }
        log::info!("drop downsample on {}", stmt.db_name);
        let rp = self.meta.retention_policy(&stmt.db_name, &stmt.rp_name)?;
        if !stmt.drop_all {
            match &rp {
                None => {
                    return Err(MetaError::RetentionPolicyNotFound(stmt.rp_name.clone()).into())
                }
                Some(rp) if !rp.has_downsample_policy() => {
                    return Err(MetaError::DownSamplePolicyNotFound(rp.name.clone()).into())
                }
                Some(_) => {}
            }
        }
        let rp_name = rp.map(|rp| rp.name).unwrap_or_else(|| stmt.rp_name.clone());
        self.meta
            .drop_downsample_policy(&stmt.db_name, &rp_name, stmt.drop_all)?;
        Ok(())
    }

    pub(super) async fn create_stream(
        &self,
        stmt: &CreateStreamStatement,
        ctx: &ExecutionContext,
    ) -> Result<(), ExecutionError> {
        let select = match stmt.query.as_ref() {
            Statement::Select(select) => select,
            _ => {
                return Err(ExecutionError::InvalidInput(
                    "create stream query must be select statement".to_string(),
                ))
            }
        };
        let options = self.select_options(ctx);
        let select = self
            .pipeline
            .prepare(select, self.shard_mapper.clone(), &options)
            .await?;
        check_stream_calls(&select.call_names())?;

        let target = &stmt.target;
        match self
            .meta
            .measurement(&target.database, &target.retention_policy, &target.name)
        {
            Ok(_) => {}
            Err(MetaError::MeasurementNotFound(_)) => {
                let source = select.sources.first().ok_or_else(|| {
                    ExecutionError::InvalidInput("create stream requires a source".to_string())
                })?;
                let src_info =
                    self.meta
                        .measurement(&source.database, &source.retention_policy, &source.name)?;
                let spec = MeasurementSpec {
                    shard_key: src_info.shard_keys.first().cloned().unwrap_or_default(),
                    engine_type: src_info.engine_type,
                    ..Default::default()
                };
                self.meta.create_measurement(
                    &target.database,
                    &target.retention_policy,
                    &target.name,
                    &spec,
                )?;
                self.meta.update_stream_mst_schema(
                    &target.database,
                    &target.retention_policy,
                    &target.name,
                    &select,
                )?;
            }
            Err(err) => return Err(err.into()),
        }

        let info = StreamInfo::new(stmt, &select);
        self.meta.create_stream_policy(&info)?;
        Ok(())
    }

    pub(super) fn set_config(&self, stmt: &SetConfigStatement) -> Result<(), ExecutionError> {
        if stmt.component == "sql" && stmt.key == "logging.level" {
            return match &stmt.value {
                Literal::String(level) => {
                    let filter = log::LevelFilter::from_str(level).map_err(|_| {
                        ExecutionError::InvalidInput(format!("invalid logging level {}", level))
                    })?;
                    log::set_max_level(filter);
                    log::info!("logging level set to {}", filter);
                    Ok(())
                }
                _ => Err(ExecutionError::InvalidInput(
                    "illegal type of logging level input".to_string(),
                )),
            };
        }
        Err(ExecutionError::InvalidInput(
            "unsupported config command".to_string(),
        ))
    }
}

fn validate_continuous_query(stmt: &CreateContinuousQueryStatement) -> Result<(), ExecutionError> {
    if stmt.source.target.is_none() {
        return Err(ExecutionError::InvalidInput(
            "must be a SELECT INTO clause".to_string(),
        ));
    }
    let mut interval = stmt.source.group_by_interval();
    if interval.is_zero() {
        return Err(ExecutionError::InvalidInput(
            "GROUP BY time duration must be greater than 0s".to_string(),
        ));
    }
    if !stmt.resample_for.is_zero() {
        if stmt.resample_every > interval {
            interval = stmt.resample_every;
        }
        if interval > stmt.resample_for {
            return Err(ExecutionError::InvalidInput(format!(
                "FOR duration must be >= GROUP BY time duration: must be a minimum of {}, got {}",
                crate::ast::format_duration(&interval),
                crate::ast::format_duration(&stmt.resample_for)
            )));
        }
    }
    Ok(())
}

fn check_stream_calls(calls: &[String]) -> Result<(), ExecutionError> {
    if calls.is_empty() {
        return Err(ExecutionError::InvalidInput(
            "create stream requires at least one aggregate call".to_string(),
        ));
    }
    match calls.iter().find(|c| !STREAM_CALLS.contains(&c.as_str())) {
        Some(call) => Err(ExecutionError::InvalidInput(format!(
            "stream does not support call {}",
            call
        ))),
        None => Ok(()),
    }
}
