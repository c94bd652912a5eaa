// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SHOW statements answered from cluster metadata

use super::StatementExecutor;
use crate::ast::{format_duration, Privilege, ShowMeasurementKeysStatement, ShowMeasurementsStatement};
use crate::exec::{ExecutionContext, ExecutionError, Series, Value};
use crate::meta::{
    ColStoreInfo, EngineType, MeasurementInfo, MetaError, RetentionPolicyInfo, ShardKeyInfo,
    StreamInfo,
};
use chrono::{DateTime, SecondsFormat, Utc};

fn rfc3339(t: &DateTime<Utc>) -> Value {
    Value::from(t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn string_list(items: &[String]) -> Value {
    Value::from(items.to_vec())
}

fn require_database(database: &str) -> Result<(), ExecutionError> {
    if database.is_empty() {
        Err(ExecutionError::DatabaseNameRequired)
    } else {
        Ok(())
    }
}

impl StatementExecutor {
    /// Databases the caller may read or write, sorted by name
    pub(super) fn show_databases(
        &self,
        show_detail: bool,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Series>, ExecutionError> {
        let columns: &[&str] = if show_detail {
            &["name", "ReplicaN", "Tag Attribute"]
        } else {
            &["name"]
        };
        let mut series = Series::new("databases", columns);
        let mut databases = self.meta.databases();
        databases.retain(|db| {
            ctx.authorizer.authorize_database(Privilege::Read, &db.name)
                || ctx.authorizer.authorize_database(Privilege::Write, &db.name)
        });
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        for db in databases {
            if show_detail {
                let tag_attr = if db.enable_tag_array { "array" } else { "default" };
                series.push_row(vec![
                    db.name.into(),
                    db.replica_n.to_string().into(),
                    tag_attr.into(),
                ]);
            } else {
                series.push_row(vec![db.name.into()]);
            }
        }
        Ok(vec![series])
    }

    pub(super) fn show_measurement_keys(
        &self,
        stmt: &ShowMeasurementKeysStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        let db = self.meta.database(&stmt.database)?;
        let rp_name = if stmt.retention_policy.is_empty() {
            db.default_retention_policy.as_str()
        } else {
            stmt.retention_policy.as_str()
        };
        let rp = db
            .retention_policy(rp_name)
            .ok_or_else(|| MetaError::RetentionPolicyNotFound(rp_name.to_string()))?;
        let mst = rp
            .measurements
            .get(&stmt.measurement)
            .ok_or_else(|| MetaError::MeasurementNotFound(stmt.measurement.clone()))?;

        let series = match stmt.name.as_str() {
            "PRIMARYKEY" => {
                let col_store = column_store(mst)?;
                Series::new("", &["primary_key"])
                    .with_rows(vec![vec![string_list(&col_store.primary_key)]])
            }
            "SORTKEY" => {
                let col_store = column_store(mst)?;
                Series::new("", &["sort_key"])
                    .with_rows(vec![vec![string_list(&col_store.sort_key)]])
            }
            "PROPERTY" => {
                let col_store = column_store(mst)?;
                Series::new("", &["property_key", "property_value"]).with_rows(vec![vec![
                    string_list(&col_store.property_key),
                    string_list(&col_store.property_value),
                ]])
            }
            "SHARDKEY" => Series::new("", &["shard_key", "type", "ShardGroup"])
                .with_rows(mst.shard_keys.iter().map(shard_key_row).collect()),
            "ENGINETYPE" => Series::new("", &["ENGINETYPE"])
                .with_rows(vec![vec![mst.engine_type.as_str().into()]]),
            "SCHEMA" => {
                let first = mst.shard_keys.first().cloned().unwrap_or_default();
                let mut row = shard_key_row(&first);
                row.push(mst.engine_type.as_str().into());
                if mst.engine_type == EngineType::ColumnStore {
                    let col_store = mst.col_store.clone().unwrap_or_default();
                    row.push(string_list(&col_store.primary_key));
                    row.push(string_list(&col_store.sort_key));
                    Series::new(
                        "",
                        &["shard_key", "type", "ShardGroup", "engine_type", "primary_key", "sort_key"],
                    )
                    .with_rows(vec![row])
                } else {
                    Series::new("", &["shard_key", "type", "ShardGroup", "engine_type"])
                        .with_rows(vec![row])
                }
            }
            other => {
                return Err(ExecutionError::InvalidInput(format!(
                    "{} is not support for this command",
                    other
                )))
            }
        };
        Ok(vec![series])
    }

    pub(super) fn show_grants_for_user(&self, name: &str) -> Result<Vec<Series>, ExecutionError> {
        let privileges = self.meta.user_privileges(name)?;
        let rows = privileges
            .into_iter()
            .map(|(db, p)| vec![db.into(), p.as_str().into()])
            .collect();
        Ok(vec![Series::new("", &["database", "privilege"]).with_rows(rows)])
    }

    pub(super) fn show_users(&self) -> Vec<Series> {
        let rows = self
            .meta
            .users()
            .into_iter()
            .map(|u| vec![u.name.into(), u.admin.into(), u.rwuser.into()])
            .collect();
        vec![Series::new("", &["user", "admin", "rwuser"]).with_rows(rows)]
    }

    /// Measurement names of a database; no series at all when nothing matches
    pub(super) fn show_measurements(
        &self,
        stmt: &ShowMeasurementsStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        require_database(&stmt.database)?;
        let names = self.meta.measurements(&stmt.database, stmt.source.as_ref())?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = names.into_iter().map(|n| vec![n.into()]).collect();
        Ok(vec![Series::new("measurements", &["name"]).with_rows(rows)])
    }

    pub(super) fn show_measurement_cardinality(
        &self,
        database: &str,
        sources: &[crate::ast::MeasurementRef],
    ) -> Result<Vec<Series>, ExecutionError> {
        require_database(database)?;
        let measurements = self.meta.match_measurements(database, sources)?;
        Ok(vec![Series::new("", &["count"])
            .with_rows(vec![vec![Value::from(measurements.len())]])])
    }

    pub(super) fn show_retention_policies(&self, database: &str) -> Result<Vec<Series>, ExecutionError> {
        require_database(database)?;
        let db = self.meta.database(database)?;
        let mut series = Series::new(
            "",
            &[
                "name",
                "duration",
                "shardGroupDuration",
                "hot duration",
                "warm duration",
                "index duration",
                "replicaN",
                "default",
            ],
        );
        for rp in db.retention_policies.values().filter(|rp| !rp.marked_deleted) {
            series.push_row(vec![
                rp.name.clone().into(),
                format_duration(&rp.duration).into(),
                format_duration(&rp.shard_group_duration).into(),
                format_duration(&rp.hot_duration).into(),
                format_duration(&rp.warm_duration).into(),
                format_duration(&rp.index_group_duration).into(),
                Value::from(rp.replica_n as u64),
                (rp.name == db.default_retention_policy).into(),
            ]);
        }
        Ok(vec![series])
    }

    /// One series per database
    pub(super) fn show_continuous_queries(&self) -> Vec<Series> {
        self.live_databases()
            .into_iter()
            .map(|db| {
                let rows = db
                    .continuous_queries
                    .iter()
                    .map(|cq| vec![cq.name.clone().into(), cq.query.clone().into()])
                    .collect();
                Series::new(db.name, &["name", "query"]).with_rows(rows)
            })
            .collect()
    }

    pub(super) fn show_shards(&self) -> Vec<Series> {
        self.live_databases()
            .into_iter()
            .map(|db| {
                let mut series = Series::new(
                    db.name.clone(),
                    &[
                        "id",
                        "database",
                        "retention_policy",
                        "shard_group",
                        "start_time",
                        "end_time",
                        "expiry_time",
                        "owners",
                    ],
                );
                for rp in db.retention_policies.values() {
                    for sg in rp.shard_groups.iter().filter(|sg| sg.deleted_at.is_none()) {
                        let expiry = expiry_time(sg.end_time, rp);
                        for shard in &sg.shards {
                            let owners = shard
                                .owners
                                .iter()
                                .map(|o| o.to_string())
                                .collect::<Vec<_>>()
                                .join(",");
                            series.push_row(vec![
                                Value::from(shard.id),
                                db.name.clone().into(),
                                rp.name.clone().into(),
                                Value::from(sg.id),
                                rfc3339(&sg.start_time),
                                rfc3339(&sg.end_time),
                                rfc3339(&expiry),
                                owners.into(),
                            ]);
                        }
                    }
                }
                series
            })
            .collect()
    }

    pub(super) fn show_shard_groups(&self) -> Vec<Series> {
        let mut series = Series::new(
            "shard groups",
            &["id", "database", "retention_policy", "start_time", "end_time", "expiry_time"],
        );
        for db in self.live_databases() {
            for rp in db.retention_policies.values() {
                for sg in rp.shard_groups.iter().filter(|sg| sg.deleted_at.is_none()) {
                    series.push_row(vec![
                        Value::from(sg.id),
                        db.name.clone().into(),
                        rp.name.clone().into(),
                        rfc3339(&sg.start_time),
                        rfc3339(&sg.end_time),
                        rfc3339(&expiry_time(sg.end_time, rp)),
                    ]);
                }
            }
        }
        vec![series]
    }

    pub(super) fn show_subscriptions(&self) -> Result<Vec<Series>, ExecutionError> {
        self.check_subscription_enabled()?;
        Ok(self
            .live_databases()
            .into_iter()
            .filter_map(|db| {
                let mut series =
                    Series::new(db.name, &["retention_policy", "name", "mode", "destinations"]);
                for rp in db.retention_policies.values() {
                    for sub in &rp.subscriptions {
                        series.push_row(vec![
                            rp.name.clone().into(),
                            sub.name.clone().into(),
                            sub.mode.clone().into(),
                            string_list(&sub.destinations),
                        ]);
                    }
                }
                (!series.values.is_empty()).then_some(series)
            })
            .collect())
    }

    pub(super) fn show_downsample(&self, database: &str) -> Result<Vec<Series>, ExecutionError> {
        if database.is_empty() {
            return Err(ExecutionError::DatabaseNameRequired);
        }
        let db = self.meta.database(database)?;
        let mut series = Series::new(
            "",
            &["rpName", "field_operator", "duration", "sampleInterval", "timeInterval"],
        );
        for rp in db.retention_policies.values() {
            let Some(policy) = &rp.downsample else {
                continue;
            };
            let calls = policy
                .calls
                .iter()
                .map(|c| format!("{}({})", c.function, c.data_type))
                .collect::<Vec<_>>()
                .join(",");
            let join = |ds: &[std::time::Duration]| {
                ds.iter().map(format_duration).collect::<Vec<_>>().join(",")
            };
            series.push_row(vec![
                rp.name.clone().into(),
                calls.into(),
                format_duration(&policy.duration).into(),
                join(&policy.sample_interval).into(),
                join(&policy.time_interval).into(),
            ]);
        }
        Ok(vec![series])
    }

    /// Streams writing from `database`, every stream when it is empty
    pub(super) fn show_streams(&self, database: &str) -> Vec<Series> {
        let mut streams: Vec<StreamInfo> = self
            .meta
            .streams()
            .into_iter()
            .filter(|s| database.is_empty() || s.src_database == database)
            .collect();
        streams.sort_by(|a, b| a.name.cmp(&b.name));
        let rows = streams.iter().map(stream_row).collect();
        vec![Series::new(
            "",
            &["name", "src", "des", "calls", "dimensions", "interval", "delay"],
        )
        .with_rows(rows)]
    }

    pub(super) fn show_configs(&self) -> Vec<Series> {
        let mut series = Series::new("configs", &["component", "instance", "name", "value"]);
        let hostname = self.config.hostname.clone();
        series.push_row(vec![
            "sql".into(),
            hostname.clone().into(),
            "logging.level".into(),
            log::max_level().to_string().to_ascii_lowercase().into(),
        ]);
        for (name, value) in self.config.sql.entries(&self.config) {
            series.push_row(vec!["sql".into(), hostname.clone().into(), name.into(), value]);
        }
        vec![series]
    }

    fn live_databases(&self) -> Vec<crate::meta::DatabaseInfo> {
        let mut databases = self.meta.databases();
        databases.retain(|db| !db.marked_deleted);
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        databases
    }
}

fn column_store(mst: &MeasurementInfo) -> Result<&ColStoreInfo, ExecutionError> {
    match (&mst.engine_type, &mst.col_store) {
        (EngineType::ColumnStore, Some(col_store)) => Ok(col_store),
        _ => Err(ExecutionError::InvalidInput(
            "only support for COLUMNSTORE engine".to_string(),
        )),
    }
}

fn shard_key_row(key: &ShardKeyInfo) -> Vec<Value> {
    vec![
        string_list(&key.shard_key),
        key.shard_type.clone().into(),
        Value::from(key.shard_group),
    ]
}

fn expiry_time(end: DateTime<Utc>, rp: &RetentionPolicyInfo) -> DateTime<Utc> {
    match chrono::Duration::from_std(rp.duration) {
        Ok(d) if !rp.duration.is_zero() => end.checked_add_signed(d).unwrap_or(end),
        _ => end,
    }
}

fn stream_row(s: &StreamInfo) -> Vec<Value> {
    let calls = s
        .calls
        .iter()
        .map(|c| format!("{}({}) AS {}", c.call, c.field, c.alias))
        .collect::<Vec<_>>()
        .join(",");
    vec![
        s.name.clone().into(),
        format!("{}.{}.{}", s.src_database, s.src_retention_policy, s.src_measurement).into(),
        format!("{}.{}.{}", s.des_database, s.des_retention_policy, s.des_measurement).into(),
        calls.into(),
        string_list(&s.dimensions),
        format_duration(&s.interval).into(),
        format_duration(&s.delay).into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_expiry_time_adds_rp_duration() {
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rp = RetentionPolicyInfo {
            duration: Duration::from_secs(86400),
            ..Default::default()
        };
        assert_eq!(
            expiry_time(end, &rp),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(expiry_time(end, &RetentionPolicyInfo::default()), end);
    }

    #[test]
    fn test_column_store_required() {
        let mst = MeasurementInfo::default();
        assert!(column_store(&mst).is_err());

        let mst = MeasurementInfo {
            engine_type: EngineType::ColumnStore,
            col_store: Some(ColStoreInfo::default()),
            ..Default::default()
        };
        assert!(column_store(&mst).is_ok());
    }
}
