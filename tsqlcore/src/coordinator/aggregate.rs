// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read aggregation: field keys, tag keys, series and their cardinalities

use super::StatementExecutor;
use crate::ast::{
    CardinalityStatement, Expr, MeasurementRef, ShowFieldKeysStatement, ShowSeriesStatement,
    ShowTagKeysStatement,
};
use crate::cluster::{CardinalityInfo, MeasurementCardinalityInfo, TagKeys};
use crate::exec::{ExecutionError, Series, Value};
use crate::merge::{
    limit_slice, limit_string_slice, merge_cardinality_by_measurement, merge_cardinality_flat,
    merge_exact_cardinality, merge_names,
};
use crate::meta::origin_measurement_name;
use chrono::SecondsFormat;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Instant;

fn require_database(database: &str) -> Result<(), ExecutionError> {
    if database.is_empty() {
        return Err(ExecutionError::DatabaseNameRequired);
    }
    Ok(())
}

impl StatementExecutor {
    /// Run `call` on every node owning `database` and collect the replies.
    ///
    /// The first failing node raises the shared flag and clears what was
    /// gathered so far; nodes finishing later drop their replies.
    pub(super) async fn gather_from_nodes<T, F, Fut>(
        &self,
        database: &str,
        call: F,
    ) -> Result<Vec<T>, ExecutionError>
    where
        F: Fn(u64, Vec<u32>) -> Fut,
        Fut: Future<Output = Result<T, ExecutionError>>,
    {
        let replies = Mutex::new(Vec::new());
        self.meta_executor
            .each_db_nodes(database, |node_id, pts, flag| {
                let replies = &replies;
                let call = &call;
                async move {
                    if flag.is_set() {
                        return Ok(());
                    }
                    let reply = call(node_id, pts).await;
                    let mut replies = replies.lock();
                    match reply {
                        Err(err) => {
                            flag.set();
                            replies.clear();
                            Err(err)
                        }
                        Ok(_) if flag.is_set() => Ok(()),
                        Ok(reply) => {
                            replies.push(reply);
                            Ok(())
                        }
                    }
                }
            })
            .await?;
        Ok(replies.into_inner())
    }

    /// Versioned names of the measurements matching `sources`
    fn matched_measurement_names(
        &self,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<Vec<String>, ExecutionError> {
        let start = Instant::now();
        let names = self
            .meta
            .match_measurements(database, sources)?
            .into_iter()
            .map(|m| m.name)
            .collect();
        log::info!("match measurement cost {:?}", start.elapsed());
        Ok(names)
    }

    /// Field keys and types per measurement, sorted by measurement then key
    fn field_keys(
        &self,
        database: &str,
        sources: &[MeasurementRef],
    ) -> Result<Vec<(String, Vec<(String, &'static str)>)>, ExecutionError> {
        let mut grouped: BTreeMap<String, BTreeMap<String, &'static str>> = BTreeMap::new();
        for (name, fields) in self.meta.field_keys(database, sources)? {
            let entry = grouped
                .entry(origin_measurement_name(&name).to_string())
                .or_default();
            for (field, column_type) in fields {
                entry.insert(field, column_type.as_str());
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(name, fields)| (name, fields.into_iter().collect()))
            .collect())
    }

    /// Tag keys per origin measurement name, sorted
    fn tag_keys(
        &self,
        database: &str,
        sources: &[MeasurementRef],
        condition: Option<&Expr>,
    ) -> Result<Vec<TagKeys>, ExecutionError> {
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, keys) in self.meta.query_tag_keys(database, sources, condition)? {
            grouped
                .entry(origin_measurement_name(&name).to_string())
                .or_default()
                .extend(keys);
        }
        Ok(grouped
            .into_iter()
            .map(|(name, keys)| TagKeys {
                name,
                keys: keys.into_iter().collect(),
            })
            .collect())
    }

    /// One series per measurement that has field keys
    pub(super) fn show_field_keys(
        &self,
        stmt: &ShowFieldKeysStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        require_database(&stmt.database)?;
        let mut series = Vec::new();
        for (name, fields) in self.field_keys(&stmt.database, &stmt.sources)? {
            let fields = limit_slice(fields, stmt.offset, stmt.limit);
            if fields.is_empty() {
                continue;
            }
            let rows = fields
                .into_iter()
                .map(|(field, ty)| vec![field.into(), ty.into()])
                .collect();
            series.push(Series::new(name, &["fieldKey", "fieldType"]).with_rows(rows));
        }
        Ok(series)
    }

    pub(super) fn show_field_key_cardinality(
        &self,
        stmt: &CardinalityStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        if stmt.condition.is_some() {
            return Err(ExecutionError::Unsupported);
        }
        require_database(&stmt.database)?;
        Ok(self
            .field_keys(&stmt.database, &stmt.sources)?
            .into_iter()
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(name, fields)| {
                Series::new(name, &["count"]).with_rows(vec![vec![Value::from(fields.len())]])
            })
            .collect())
    }

    pub(super) fn show_tag_keys(
        &self,
        stmt: &ShowTagKeysStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        if stmt.condition.is_some() {
            return Err(ExecutionError::Unsupported);
        }
        require_database(&stmt.database)?;
        let mut series = Vec::new();
        for tag_keys in self.tag_keys(&stmt.database, &stmt.sources, None)? {
            let keys = limit_string_slice(tag_keys.keys, stmt.offset, stmt.limit);
            if keys.is_empty() {
                continue;
            }
            let rows = keys.into_iter().map(|k| vec![k.into()]).collect();
            series.push(Series::new(tag_keys.name, &["tagKey"]).with_rows(rows));
        }
        Ok(series)
    }

    pub(super) fn show_tag_key_cardinality(
        &self,
        stmt: &CardinalityStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        if stmt.condition.is_some() {
            return Err(ExecutionError::Unsupported);
        }
        require_database(&stmt.database)?;
        Ok(self
            .tag_keys(&stmt.database, &stmt.sources, None)?
            .into_iter()
            .filter(|tk| !tk.keys.is_empty())
            .map(|tk| {
                Series::new(tk.name, &["count"]).with_rows(vec![vec![Value::from(tk.keys.len())]])
            })
            .collect())
    }

    /// Series keys from every node, merged, sorted and paged
    pub(super) async fn show_series(
        &self,
        stmt: &ShowSeriesStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        require_database(&stmt.database)?;
        let names = self.matched_measurement_names(&stmt.database, &stmt.sources)?;
        let database = stmt.database.as_str();
        let condition = stmt.condition.as_ref();
        let replies = self
            .gather_from_nodes(database, |node_id, pts| {
                let names = &names;
                async move {
                    self.transport
                        .show_series(node_id, database, &pts, names, condition)
                        .await
                }
            })
            .await
            .map_err(|err| {
                log::error!("failed to show series: {}", err);
                err
            })?;

        let keys = limit_string_slice(merge_names(replies), stmt.offset, stmt.limit);
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = keys.into_iter().map(|k| vec![k.into()]).collect();
        Ok(vec![Series::new("", &["key"]).with_rows(rows)])
    }

    /// Approximate per-measurement cardinality replies from every node
    pub(super) async fn series_cardinality_replies(
        &self,
        database: &str,
        names: &[String],
        condition: Option<&Expr>,
    ) -> Result<Vec<Vec<MeasurementCardinalityInfo>>, ExecutionError> {
        self.gather_from_nodes(database, |node_id, pts| async move {
            self.transport
                .series_cardinality(node_id, database, &pts, names, condition)
                .await
        })
        .await
    }

    pub(super) async fn show_series_cardinality(
        &self,
        stmt: &CardinalityStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        require_database(&stmt.database)?;
        let start = Instant::now();
        let names = self.matched_measurement_names(&stmt.database, &stmt.sources)?;
        let condition = stmt.condition.as_ref();

        let series = if stmt.exact {
            self.series_exact_cardinality(&stmt.database, &names, condition)
                .await?
        } else if condition.is_some() || !stmt.sources.is_empty() {
            let replies = self
                .series_cardinality_replies(&stmt.database, &names, condition)
                .await
                .map_err(|err| {
                    log::error!("failed to show series cardinality with condition: {}", err);
                    err
                })?;
            merge_cardinality_by_measurement(replies)
                .into_iter()
                .flat_map(|mst| {
                    let name = origin_measurement_name(&mst.name).to_string();
                    mst.infos
                        .into_iter()
                        .map(move |info| cardinality_series(&name, &info))
                })
                .collect()
        } else {
            let replies = self
                .series_cardinality_replies(&stmt.database, &names, None)
                .await
                .map_err(|err| {
                    log::error!("failed to show series cardinality: {}", err);
                    err
                })?;
            merge_cardinality_flat(replies)
                .iter()
                .map(|info| cardinality_series("", info))
                .collect()
        };
        log::info!("total show series cardinality cost {:?}", start.elapsed());
        Ok(series)
    }

    async fn series_exact_cardinality(
        &self,
        database: &str,
        names: &[String],
        condition: Option<&Expr>,
    ) -> Result<Vec<Series>, ExecutionError> {
        let replies = self
            .gather_from_nodes(database, |node_id, pts| async move {
                self.transport
                    .series_exact_cardinality(node_id, database, &pts, names, condition)
                    .await
            })
            .await
            .map_err(|err| {
                log::error!("failed to show series exact cardinality: {}", err);
                err
            })?;
        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        for (name, n) in merge_exact_cardinality(replies) {
            *totals
                .entry(origin_measurement_name(&name).to_string())
                .or_insert(0) += n;
        }
        Ok(totals
            .into_iter()
            .map(|(name, n)| Series::new(name, &["count"]).with_rows(vec![vec![Value::from(n)]]))
            .collect())
    }
}

fn cardinality_series(name: &str, info: &CardinalityInfo) -> Series {
    Series::new(name, &["startTime", "endTime", "count"]).with_rows(vec![vec![
        info.time_range
            .start
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .into(),
        info.time_range
            .end
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .into(),
        Value::from(info.cardinality),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::TimeRange;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_cardinality_series_renders_rfc3339() {
        let info = CardinalityInfo {
            time_range: TimeRange::new(
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
            ),
            cardinality: 42,
        };
        let series = cardinality_series("cpu", &info);
        assert_eq!(series.name, "cpu");
        assert_eq!(
            series.values[0],
            vec![
                Value::from("2024-03-01T00:00:00Z"),
                Value::from("2024-03-02T00:00:00Z"),
                Value::from(42u64),
            ]
        );
    }
}
