// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage node access: fan-out and the per-node transport

pub mod fanout;
pub mod transport;

pub use fanout::{ErrorFlag, MetaExecutor};
pub use transport::*;
