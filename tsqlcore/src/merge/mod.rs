// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result merger
//!
//! Pure functions folding per-node partial results into one cluster-wide
//! answer. Every output is sorted, so the result does not depend on the order
//! nodes replied in.

pub mod cardinality;

pub use cardinality::{
    merge_cardinality_by_measurement, merge_cardinality_flat, merge_exact_cardinality,
    sort_and_merge,
};

use crate::cluster::{NodeStatementMessage, StatementMessageType, TableTagSets, TagKeys, TagSet};
use crate::exec::ExecutionError;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};

/// Union of name lists, deduplicated and sorted bytewise
pub fn merge_names<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    lists
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Union tag keys per measurement
pub fn merge_tag_keys<I>(lists: I) -> Vec<TagKeys>
where
    I: IntoIterator<Item = Vec<TagKeys>>,
{
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for tag_keys in lists.into_iter().flatten() {
        grouped.entry(tag_keys.name).or_default().extend(tag_keys.keys);
    }
    grouped
        .into_iter()
        .map(|(name, keys)| TagKeys {
            name,
            keys: keys.into_iter().collect(),
        })
        .collect()
}

/// Union (key, value) pairs per measurement, ordered by key then value
pub fn merge_tag_values<I>(lists: I) -> Vec<TableTagSets>
where
    I: IntoIterator<Item = Vec<TableTagSets>>,
{
    let mut grouped: BTreeMap<String, BTreeSet<TagSet>> = BTreeMap::new();
    for tag_sets in lists.into_iter().flatten() {
        grouped.entry(tag_sets.name).or_default().extend(tag_sets.values);
    }
    grouped
        .into_iter()
        .map(|(name, values)| TableTagSets {
            name,
            values: values.into_iter().collect(),
        })
        .collect()
}

/// Names in `result` that are absent from `filtered`, sorted
pub fn remove_filtered(result: Vec<String>, filtered: &[String]) -> Vec<String> {
    if filtered.is_empty() {
        return result;
    }
    let mut remaining: BTreeSet<String> = result.into_iter().collect();
    for name in filtered {
        remaining.remove(name);
    }
    remaining.into_iter().collect()
}

/// Apply OFFSET/LIMIT to a list; a zero limit keeps everything after the offset
pub fn limit_slice<T>(mut values: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    if offset >= values.len() {
        return Vec::new();
    }
    let end = match offset.checked_add(limit) {
        Some(end) if limit > 0 && end < values.len() => end,
        _ => values.len(),
    };
    values.truncate(end);
    values.drain(..offset);
    values
}

pub fn limit_string_slice(values: Vec<String>, offset: usize, limit: usize) -> Vec<String> {
    limit_slice(values, offset, limit)
}

/// Cluster-wide answer assembled from raw node replies
#[derive(Debug, Clone, PartialEq)]
pub enum MergedReply {
    Names(Vec<String>),
    TagKeys(Vec<TagKeys>),
    TagValues(Vec<TableTagSets>),
    Cardinality(i64),
}

fn statement_type(
    messages: &BTreeMap<u64, NodeStatementMessage>,
) -> Option<StatementMessageType> {
    messages.values().next().map(|msg| msg.statement_type)
}

fn decode_all<T, F>(
    messages: &BTreeMap<u64, NodeStatementMessage>,
    payload: F,
) -> Result<Vec<T>, ExecutionError>
where
    T: DeserializeOwned,
    F: Fn(&NodeStatementMessage) -> &[u8],
{
    let mut decoded = Vec::with_capacity(messages.len());
    for (node_id, msg) in messages {
        let bytes = payload(msg);
        if bytes.is_empty() {
            continue;
        }
        let value = serde_json::from_slice(bytes).map_err(|e| {
            ExecutionError::Decode(format!(
                "node {} reply to {}: {}",
                node_id,
                msg.statement_type.as_str(),
                e
            ))
        })?;
        decoded.push(value);
    }
    Ok(decoded)
}

fn unsupported_type(stmt_type: Option<StatementMessageType>) -> ExecutionError {
    ExecutionError::InvalidInput(format!(
        "ExecuteStatement type[{}] not supported",
        stmt_type.map(|t| t.as_str()).unwrap_or("")
    ))
}

/// Sum per-node integer counts
pub fn calc_cardinality(
    messages: &BTreeMap<u64, NodeStatementMessage>,
) -> Result<i64, ExecutionError> {
    let counts: Vec<i64> = decode_all(messages, |msg| msg.result.as_slice())?;
    Ok(counts.into_iter().sum())
}

/// Merge the `result` payloads of raw node replies, dispatching on the
/// statement type the replies carry
pub fn merge_all_node_message(
    messages: &BTreeMap<u64, NodeStatementMessage>,
) -> Result<MergedReply, ExecutionError> {
    let stmt_type = statement_type(messages);
    match stmt_type {
        Some(StatementMessageType::ShowMeasurements) => Ok(MergedReply::Names(merge_names(
            decode_all::<Vec<String>, _>(messages, |msg| msg.result.as_slice())?,
        ))),
        Some(StatementMessageType::ShowTagKeys) => Ok(MergedReply::TagKeys(merge_tag_keys(
            decode_all::<Vec<TagKeys>, _>(messages, |msg| msg.result.as_slice())?,
        ))),
        Some(StatementMessageType::ShowTagValues) => Ok(MergedReply::TagValues(
            merge_tag_values(decode_all::<Vec<TableTagSets>, _>(messages, |msg| msg.result.as_slice())?),
        )),
        Some(StatementMessageType::ShowSeriesCardinality)
        | Some(StatementMessageType::ShowMeasurementCardinality) => {
            Ok(MergedReply::Cardinality(calc_cardinality(messages)?))
        }
        _ => Err(unsupported_type(stmt_type)),
    }
}

/// Merge the `filtered` payloads of raw node replies
pub fn merge_all_node_filtered(
    messages: &BTreeMap<u64, NodeStatementMessage>,
) -> Result<MergedReply, ExecutionError> {
    let stmt_type = statement_type(messages);
    match stmt_type {
        Some(StatementMessageType::ShowMeasurements) => Ok(MergedReply::Names(merge_names(
            decode_all::<Vec<String>, _>(messages, |msg| msg.filtered.as_slice())?,
        ))),
        Some(StatementMessageType::ShowTagKeys) => Ok(MergedReply::TagKeys(merge_tag_keys(
            decode_all::<Vec<TagKeys>, _>(messages, |msg| msg.filtered.as_slice())?,
        ))),
        _ => Err(unsupported_type(stmt_type)),
    }
}
