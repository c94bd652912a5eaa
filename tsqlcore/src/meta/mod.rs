// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cluster metadata: the client capability, its info objects and validation

pub mod client;
pub mod error;
pub mod types;
pub mod validate;

pub use client::MetaClient;
pub use error::MetaError;
pub use types::*;
pub use validate::{origin_measurement_name, valid_measurement_name, valid_name, valid_shard_key};
