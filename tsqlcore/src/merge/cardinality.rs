// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Time-ranged cardinality merge

use crate::cluster::{CardinalityInfo, MeasurementCardinalityInfo};
use std::collections::BTreeMap;

/// Sort infos by time range and fold ranges that share time.
///
/// Identical or overlapping neighbours are summed into one range spanning
/// both. Ranges that merely touch stay separate: each is a distinct shard
/// group window, and statistics split recent from history series at those
/// window boundaries. Empty ranges are dropped.
pub fn sort_and_merge(mut infos: Vec<CardinalityInfo>) -> Vec<CardinalityInfo> {
    infos.retain(|info| !info.time_range.is_empty());
    infos.sort_by(|a, b| a.time_range.cmp(&b.time_range));

    let mut merged: Vec<CardinalityInfo> = Vec::with_capacity(infos.len());
    for info in infos {
        match merged.last_mut() {
            Some(last)
                if last.time_range == info.time_range
                    || last.time_range.overlaps(&info.time_range) =>
            {
                last.cardinality += info.cardinality;
                if info.time_range.end > last.time_range.end {
                    last.time_range.end = info.time_range.end;
                }
            }
            _ => merged.push(info),
        }
    }
    merged
}

/// Merge node replies into one sorted time-ranged list across all measurements
pub fn merge_cardinality_flat<I>(replies: I) -> Vec<CardinalityInfo>
where
    I: IntoIterator<Item = Vec<MeasurementCardinalityInfo>>,
{
    let all = replies
        .into_iter()
        .flatten()
        .flat_map(|mst| mst.infos)
        .collect();
    sort_and_merge(all)
}

/// Merge node replies per measurement, measurements sorted by name
pub fn merge_cardinality_by_measurement<I>(replies: I) -> Vec<MeasurementCardinalityInfo>
where
    I: IntoIterator<Item = Vec<MeasurementCardinalityInfo>>,
{
    let mut grouped: BTreeMap<String, Vec<CardinalityInfo>> = BTreeMap::new();
    for mst in replies.into_iter().flatten() {
        grouped.entry(mst.name).or_default().extend(mst.infos);
    }
    grouped
        .into_iter()
        .map(|(name, infos)| MeasurementCardinalityInfo {
            name,
            infos: sort_and_merge(infos),
        })
        .collect()
}

/// Sum exact per-measurement counts across nodes
pub fn merge_exact_cardinality<I>(replies: I) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = BTreeMap<String, u64>>,
{
    let mut total = BTreeMap::new();
    for reply in replies {
        for (name, n) in reply {
            *total.entry(name).or_insert(0u64) += n;
        }
    }
    total
}
