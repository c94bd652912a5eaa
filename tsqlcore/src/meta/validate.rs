// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Name and shard key validation

use super::MetaError;
use std::collections::HashSet;

const MAX_NAME_LEN: usize = 255;

/// Length of the `_NNNN` version suffix the storage layer appends
const VERSION_SUFFIX_LEN: usize = 5;

fn split_version(name: &str) -> Option<&str> {
    let at = name.len().checked_sub(VERSION_SUFFIX_LEN)?;
    if at == 0 || !name.is_char_boundary(at) {
        return None;
    }
    let (origin, suffix) = name.split_at(at);
    let mut chars = suffix.chars();
    if chars.next() == Some('_') && chars.all(|c| c.is_ascii_digit()) {
        Some(origin)
    } else {
        None
    }
}

/// Database, retention policy and user names
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.chars().any(|c| c.is_control())
}

/// Measurement names may not collide with the storage version suffix
pub fn valid_measurement_name(name: &str) -> bool {
    valid_name(name) && !name.contains(',') && split_version(name).is_none()
}

/// Shard keys must be non-empty, valid names and free of duplicates
pub fn valid_shard_key(keys: &[String]) -> Result<(), MetaError> {
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        if key.is_empty() {
            return Err(MetaError::InvalidShardKey("empty key".to_string()));
        }
        if key == "time" {
            return Err(MetaError::InvalidShardKey(
                "time cannot be used as shard key".to_string(),
            ));
        }
        if !valid_name(key) {
            return Err(MetaError::InvalidShardKey(key.clone()));
        }
        if !seen.insert(key.as_str()) {
            return Err(MetaError::InvalidShardKey(format!("duplicate key {}", key)));
        }
    }
    Ok(())
}

/// Strip the storage version suffix (`cpu_0000` -> `cpu`)
pub fn origin_measurement_name(name: &str) -> &str {
    split_version(name).unwrap_or(name)
}
