// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement results sent to the client

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single cell of a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Unsigned(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Unsigned(value as u64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Value::List(values.into_iter().map(Value::String).collect())
    }
}

/// One named table of rows
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl Series {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.values.push(row);
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.values = rows;
        self
    }
}

/// Advisory text attached to a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: String,
    pub text: String,
}

impl Message {
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            text: text.into(),
        }
    }
}

/// Advisory for a mutating statement run through a read-only request
pub fn read_only_warning(statement: &str) -> Message {
    Message::warning(format!(
        "deprecated use of '{}' in a read only context, please use a POST request instead",
        statement
    ))
}

/// Result of one statement, or one chunk of a streamed SELECT
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub statement_id: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Series>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// More chunks of the same statement follow
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl QueryResult {
    /// A result with no rows
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_series(series: Vec<Series>) -> Self {
        Self {
            series,
            ..Default::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.values.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&QueryResult::empty()).unwrap();
        assert_eq!(json, r#"{"statement_id":0}"#);

        let mut series = Series::new("measurements", &["name"]);
        series.push_row(vec!["cpu".into()]);
        let json = serde_json::to_value(QueryResult::from_series(vec![series])).unwrap();
        assert_eq!(json["series"][0]["values"][0][0], "cpu");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3usize).as_u64(), Some(3));
        assert_eq!(Value::from(-1i64).as_u64(), None);
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(
            Value::from(vec!["a".to_string()]),
            Value::List(vec![Value::String("a".to_string())])
        );
    }
}
