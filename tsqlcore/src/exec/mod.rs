// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution plumbing shared by every statement handler
//!
//! The context carries request defaults, the cancellation signal and the
//! result sink. Results and errors defined here are the only values that
//! cross the coordinator boundary.

pub mod context;
pub mod error;
pub mod result;
pub mod sink;

pub use context::{Authorizer, ExecutionContext, ExecutionOptions, OpenAuthorizer};
pub use error::ExecutionError;
pub use result::{read_only_warning, Message, QueryResult, Series, Value};
pub use sink::{ChannelSink, ResultSink};
