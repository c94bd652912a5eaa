// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parsed statement model handed to the coordinator

pub mod display;
pub mod expr;
pub mod statement;

pub use expr::{format_duration, BinaryOp, Expr};
pub use statement::*;
