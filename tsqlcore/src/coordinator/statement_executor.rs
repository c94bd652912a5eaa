// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement dispatch

use super::retry::retry_dml;
use super::{Outcome, StatementExecutor};
use crate::ast::Statement;
use crate::exec::{read_only_warning, ExecutionContext, ExecutionError, QueryResult, Series};

impl StatementExecutor {
    /// Execute one parsed statement and send its results to the context's
    /// sink at `seq`.
    ///
    /// SELECT streams one result per row batch. Every other statement sends
    /// exactly one result on success, except SHOW FIELD KEYS, SHOW TAG KEYS
    /// and their cardinalities which send one result per measurement. Nothing
    /// is sent when an error is returned.
    pub async fn execute(
        &self,
        stmt: &Statement,
        ctx: &ExecutionContext,
        seq: usize,
    ) -> Result<(), ExecutionError> {
        if let Statement::Select(select) = stmt {
            let result = self.execute_select_with_retry(select, ctx, seq).await;
            if let Err(err) = &result {
                self.errors.record(err);
                if err.is_client_error() {
                    log::error!("execute select statement 400 error: {}: {}", select, err);
                } else {
                    log::error!("execute select statement 500 error: {}: {}", select, err);
                }
            }
            return result;
        }

        log::info!("start execute statement: {}", stmt);
        let mut messages = Vec::new();
        if ctx.read_only && stmt.mutates_metadata() {
            messages.push(read_only_warning(&stmt.to_string()));
        }

        match self.dispatch(stmt, ctx, seq).await? {
            Outcome::Rows(series) => {
                ctx.send(QueryResult::from_series(series).with_messages(messages), seq)
                    .await
            }
            Outcome::Emitted => Ok(()),
        }
    }

    async fn dispatch(
        &self,
        stmt: &Statement,
        ctx: &ExecutionContext,
        seq: usize,
    ) -> Result<Outcome, ExecutionError> {
        let policy = &self.config.retry;
        let what = stmt.kind();
        let cancel = &ctx.cancel;

        let outcome = match stmt {
            // Routed through execute_select_with_retry before dispatch
            Statement::Select(_) => return Err(ExecutionError::InvalidQuery),

            // Metadata changes
            Statement::AlterRetentionPolicy(s) => {
                self.alter_retention_policy(s)?;
                Outcome::none()
            }
            Statement::AlterShardKey(s) => {
                self.alter_shard_key(s)?;
                Outcome::none()
            }
            Statement::CreateDatabase(s) => {
                self.create_database(s)?;
                Outcome::none()
            }
            Statement::CreateMeasurement(s) => {
                self.create_measurement(s)?;
                Outcome::none()
            }
            Statement::CreateRetentionPolicy(s) => {
                self.create_retention_policy(s)?;
                Outcome::none()
            }
            Statement::CreateSubscription(s) => {
                self.check_subscription_enabled()?;
                self.meta.create_subscription(
                    &s.database,
                    &s.retention_policy,
                    &s.name,
                    &s.mode,
                    &s.destinations,
                )?;
                Outcome::none()
            }
            Statement::DropSubscription(s) => {
                self.check_subscription_enabled()?;
                self.meta
                    .drop_subscription(&s.database, &s.retention_policy, &s.name)?;
                Outcome::none()
            }
            Statement::CreateContinuousQuery(s) => {
                self.create_continuous_query(s)?;
                Outcome::none()
            }
            Statement::DropContinuousQuery(s) => {
                self.drop_continuous_query(&s.name, &s.database)?;
                Outcome::none()
            }
            Statement::CreateUser(s) => {
                self.meta.create_user(&s.name, &s.password, s.admin, s.rwuser)?;
                Outcome::none()
            }
            Statement::DropUser { name } => {
                self.meta.drop_user(name)?;
                Outcome::none()
            }
            Statement::SetPasswordUser { name, password } => {
                self.meta.update_user(name, password)?;
                Outcome::none()
            }
            Statement::Grant(s) => {
                self.meta.set_privilege(&s.user, &s.on, s.privilege)?;
                Outcome::none()
            }
            Statement::Revoke(s) => {
                self.revoke(s)?;
                Outcome::none()
            }
            Statement::GrantAdmin { user } => {
                self.meta.set_admin_privilege(user, true)?;
                Outcome::none()
            }
            Statement::RevokeAdmin { user } => {
                self.meta.set_admin_privilege(user, false)?;
                Outcome::none()
            }
            Statement::CreateDownSample(s) => {
                self.create_downsample(s)?;
                Outcome::none()
            }
            Statement::DropDownSample(s) => {
                self.drop_downsample(s)?;
                Outcome::none()
            }
            Statement::CreateStream(s) => {
                self.create_stream(s, ctx).await?;
                Outcome::none()
            }
            Statement::DropStream { name } => {
                self.meta.drop_stream(name)?;
                Outcome::none()
            }
            Statement::SetConfig(s) => {
                self.set_config(s)?;
                Outcome::none()
            }

            // Drops retried while topology settles
            Statement::DropDatabase { name } => {
                retry_dml(policy, what, cancel, || async move { self.drop_database(name) }).await?;
                Outcome::none()
            }
            Statement::DropMeasurement { name } => {
                let database = ctx.database.as_str();
                retry_dml(policy, what, cancel, || async move {
                    self.drop_measurement(database, name)
                })
                .await?;
                Outcome::none()
            }
            Statement::DropRetentionPolicy(s) => {
                retry_dml(policy, what, cancel, || async move {
                    self.drop_retention_policy(s)
                })
                .await?;
                Outcome::none()
            }

            // Metadata reads
            Statement::ShowDatabases { show_detail } => {
                Outcome::Rows(self.show_databases(*show_detail, ctx)?)
            }
            Statement::ShowGrantsForUser { name } => Outcome::Rows(self.show_grants_for_user(name)?),
            Statement::ShowMeasurementKeys(s) => Outcome::Rows(self.show_measurement_keys(s)?),
            Statement::ShowRetentionPolicies { database } => {
                Outcome::Rows(self.show_retention_policies(database)?)
            }
            Statement::ShowContinuousQueries => Outcome::Rows(self.show_continuous_queries()),
            Statement::ShowShards => Outcome::Rows(self.show_shards()),
            Statement::ShowShardGroups => Outcome::Rows(self.show_shard_groups()),
            Statement::ShowSubscriptions => Outcome::Rows(self.show_subscriptions()?),
            Statement::ShowUsers => Outcome::Rows(self.show_users()),
            Statement::ShowDownSample { db_name } => Outcome::Rows(self.show_downsample(db_name)?),
            Statement::ShowStreams { database } => Outcome::Rows(self.show_streams(database)),
            Statement::ShowConfigs => Outcome::Rows(self.show_configs()),
            Statement::ShowQueries => Outcome::Rows(self.show_queries().await?),
            Statement::KillQuery(s) => {
                self.kill_query(s).await?;
                Outcome::none()
            }

            // Read aggregation, retried while topology settles
            Statement::ShowMeasurements(s) => {
                if s.condition.is_some() {
                    return Err(ExecutionError::Unsupported);
                }
                Outcome::Rows(
                    retry_dml(policy, what, cancel, || async move { self.show_measurements(s) })
                        .await?,
                )
            }
            Statement::ShowMeasurementCardinality(s) => {
                if s.condition.is_some() {
                    return Err(ExecutionError::Unsupported);
                }
                Outcome::Rows(
                    retry_dml(policy, what, cancel, || async move {
                        self.show_measurement_cardinality(&s.database, &s.sources)
                    })
                    .await?,
                )
            }
            Statement::ShowSeriesCardinality(s) => Outcome::Rows(
                retry_dml(policy, what, cancel, || self.show_series_cardinality(s)).await?,
            ),
            Statement::ShowSeries(s) => {
                Outcome::Rows(retry_dml(policy, what, cancel, || self.show_series(s)).await?)
            }
            Statement::ShowTagValues(s) => {
                Outcome::Rows(retry_dml(policy, what, cancel, || self.show_tag_values(s)).await?)
            }
            Statement::ShowTagValuesCardinality(s) => Outcome::Rows(
                retry_dml(policy, what, cancel, || self.show_tag_values_cardinality(s)).await?,
            ),
            Statement::ShowFieldKeys(s) => {
                let series =
                    retry_dml(policy, what, cancel, || async move { self.show_field_keys(s) })
                        .await?;
                self.emit_each(series, ctx, seq).await?
            }
            Statement::ShowFieldKeyCardinality(s) => {
                let series = retry_dml(policy, what, cancel, || async move {
                    self.show_field_key_cardinality(s)
                })
                .await?;
                self.emit_each(series, ctx, seq).await?
            }
            Statement::ShowTagKeys(s) => {
                let series =
                    retry_dml(policy, what, cancel, || async move { self.show_tag_keys(s) })
                        .await?;
                self.emit_each(series, ctx, seq).await?
            }
            Statement::ShowTagKeyCardinality(s) => {
                let series = retry_dml(policy, what, cancel, || async move {
                    self.show_tag_key_cardinality(s)
                })
                .await?;
                self.emit_each(series, ctx, seq).await?
            }
            Statement::Explain(s) => {
                Outcome::Rows(retry_dml(policy, what, cancel, || self.execute_explain(s, ctx)).await?)
            }

            Statement::DeleteSeries(_)
            | Statement::DropSeries(_)
            | Statement::DropShard { .. }
            | Statement::ShowDiagnostics { .. }
            | Statement::PrepareSnapshot
            | Statement::EndPrepareSnapshot
            | Statement::GetRuntimeInfo => return Err(ExecutionError::Unsupported),

            // Answered by the statistics service of the node
            Statement::ShowStats { .. } => return Err(ExecutionError::InvalidQuery),
        };
        Ok(outcome)
    }

    /// Send one result per series, or a single empty result when there is none
    async fn emit_each(
        &self,
        series: Vec<Series>,
        ctx: &ExecutionContext,
        seq: usize,
    ) -> Result<Outcome, ExecutionError> {
        if series.is_empty() {
            ctx.send(QueryResult::empty(), seq).await?;
            return Ok(Outcome::Emitted);
        }
        for s in series {
            ctx.send(QueryResult::from_series(vec![s]), seq).await?;
        }
        Ok(Outcome::Emitted)
    }
}
