// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SHOW TAG VALUES and SHOW TAG VALUES CARDINALITY

use super::StatementExecutor;
use crate::ast::{
    Expr, MeasurementRef, ShowTagValuesCardinalityStatement, ShowTagValuesStatement, TagKeyFilter,
};
use crate::exec::{ExecutionError, Series, Value};
use crate::merge::{limit_slice, merge_tag_values};
use crate::meta::origin_measurement_name;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Compiled `WITH KEY` selector
enum KeyMatcher<'a> {
    Eq(&'a str),
    Neq(&'a str),
    In(BTreeSet<&'a str>),
    Regex(Regex),
    NotRegex(Regex),
}

impl<'a> KeyMatcher<'a> {
    fn compile(filter: &'a TagKeyFilter) -> Result<Self, ExecutionError> {
        let regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ExecutionError::InvalidInput(format!("invalid tag key regex {}: {}", pattern, e))
            })
        };
        Ok(match filter {
            TagKeyFilter::Eq(key) => KeyMatcher::Eq(key),
            TagKeyFilter::Neq(key) => KeyMatcher::Neq(key),
            TagKeyFilter::In(keys) => KeyMatcher::In(keys.iter().map(String::as_str).collect()),
            TagKeyFilter::Regex(pattern) => KeyMatcher::Regex(regex(pattern)?),
            TagKeyFilter::NotRegex(pattern) => KeyMatcher::NotRegex(regex(pattern)?),
        })
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Eq(k) => key == *k,
            KeyMatcher::Neq(k) => key != *k,
            KeyMatcher::In(keys) => keys.contains(key),
            KeyMatcher::Regex(re) => re.is_match(key),
            KeyMatcher::NotRegex(re) => !re.is_match(key),
        }
    }
}

/// Tag values of one measurement, sorted by key then value
struct MeasurementTagValues {
    name: String,
    values: Vec<(String, String)>,
}

impl StatementExecutor {
    async fn collect_tag_values(
        &self,
        database: &str,
        sources: &[MeasurementRef],
        tag_key: &TagKeyFilter,
        condition: Option<&Expr>,
    ) -> Result<Vec<MeasurementTagValues>, ExecutionError> {
        if database.is_empty() {
            return Err(ExecutionError::DatabaseNameRequired);
        }
        let matcher = KeyMatcher::compile(tag_key)?;

        let mut tag_keys: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, keys) in self.meta.query_tag_keys(database, sources, None)? {
            let keys: BTreeSet<String> = keys.into_iter().filter(|k| matcher.matches(k)).collect();
            if !keys.is_empty() {
                tag_keys.insert(name, keys);
            }
        }
        if tag_keys.is_empty() {
            return Ok(Vec::new());
        }

        let tag_keys = &tag_keys;
        let replies = self
            .gather_from_nodes(database, |node_id, pts| async move {
                self.transport
                    .tag_values(node_id, database, &pts, tag_keys, condition)
                    .await
            })
            .await
            .map_err(|err| {
                log::error!("failed to show tag values: {}", err);
                err
            })?;

        let mut grouped: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
        for table in merge_tag_values(replies) {
            grouped
                .entry(origin_measurement_name(&table.name).to_string())
                .or_default()
                .extend(table.values.into_iter().map(|tv| (tv.key, tv.value)));
        }
        Ok(grouped
            .into_iter()
            .map(|(name, values)| MeasurementTagValues {
                name,
                values: values.into_iter().collect(),
            })
            .collect())
    }

    /// One series of `(key, value)` rows per measurement, paged per measurement
    pub(super) async fn show_tag_values(
        &self,
        stmt: &ShowTagValuesStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        let tables = self
            .collect_tag_values(
                &stmt.database,
                &stmt.sources,
                &stmt.tag_key,
                stmt.condition.as_ref(),
            )
            .await?;
        let mut series = Vec::new();
        for table in tables {
            let values = limit_slice(table.values, stmt.offset, stmt.limit);
            if values.is_empty() {
                continue;
            }
            let rows = values
                .into_iter()
                .map(|(k, v)| vec![k.into(), v.into()])
                .collect();
            series.push(Series::new(table.name, &["key", "value"]).with_rows(rows));
        }
        Ok(series)
    }

    pub(super) async fn show_tag_values_cardinality(
        &self,
        stmt: &ShowTagValuesCardinalityStatement,
    ) -> Result<Vec<Series>, ExecutionError> {
        let tables = self
            .collect_tag_values(
                &stmt.database,
                &stmt.sources,
                &stmt.tag_key,
                stmt.condition.as_ref(),
            )
            .await?;
        Ok(tables
            .into_iter()
            .filter(|t| !t.values.is_empty())
            .map(|t| {
                Series::new(t.name, &["count"]).with_rows(vec![vec![Value::from(t.values.len())]])
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matcher() {
        let eq = TagKeyFilter::Eq("host".to_string());
        let m = KeyMatcher::compile(&eq).unwrap();
        assert!(m.matches("host"));
        assert!(!m.matches("region"));

        let neq = TagKeyFilter::Neq("host".to_string());
        assert!(KeyMatcher::compile(&neq).unwrap().matches("region"));

        let within = TagKeyFilter::In(vec!["a".to_string(), "b".to_string()]);
        let m = KeyMatcher::compile(&within).unwrap();
        assert!(m.matches("b"));
        assert!(!m.matches("c"));

        let re = TagKeyFilter::Regex("^ho".to_string());
        assert!(KeyMatcher::compile(&re).unwrap().matches("host"));
        let not_re = TagKeyFilter::NotRegex("^ho".to_string());
        assert!(!KeyMatcher::compile(&not_re).unwrap().matches("host"));
    }

    #[test]
    fn test_bad_regex_is_rejected() {
        let bad = TagKeyFilter::Regex("(".to_string());
        assert!(matches!(
            KeyMatcher::compile(&bad),
            Err(ExecutionError::InvalidInput(_))
        ));
    }
}
