// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator configuration

use crate::ast::format_duration;
use crate::exec::{ExecutionError, Value};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the statement executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum points a SELECT may read (0 = unlimited)
    pub max_select_point_n: usize,

    /// Maximum series a SELECT may read (0 = unlimited)
    pub max_select_series_n: usize,

    /// Maximum fields a SELECT may project (0 = unlimited)
    pub max_select_fields_n: usize,

    /// Maximum GROUP BY time buckets (0 = unlimited)
    pub max_select_buckets_n: usize,

    /// Memory cap of one query (bytes, 0 = unlimited)
    pub max_query_mem: u64,

    /// Parallelism handed to the pipeline
    pub max_query_parallel: usize,

    pub query_time_compare_enabled: bool,

    /// Total retention policies allowed across all databases
    pub retention_policy_limit: usize,

    /// Reported as the instance of SHOW CONFIGS rows
    pub hostname: String,

    pub subscription_enabled: bool,

    pub retry: RetryConfig,

    pub sql: SqlNodeSettings,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_select_point_n: 0,
            max_select_series_n: 0,
            max_select_fields_n: 0,
            max_select_buckets_n: 0,
            max_query_mem: 0,
            max_query_parallel: 4,
            query_time_compare_enabled: true,
            retention_policy_limit: 100,
            hostname: "localhost".to_string(),
            subscription_enabled: false,
            retry: RetryConfig::default(),
            sql: SqlNodeSettings::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Parse a JSON document, filling unspecified fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self, ExecutionError> {
        let config: CoordinatorConfig = serde_json::from_str(json)
            .map_err(|e| ExecutionError::InvalidInput(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.retention_policy_limit == 0 {
            return Err(ExecutionError::InvalidInput(
                "retention_policy_limit must be positive".to_string(),
            ));
        }
        if self.max_query_parallel == 0 {
            return Err(ExecutionError::InvalidInput(
                "max_query_parallel must be positive".to_string(),
            ));
        }
        self.retry.validate()
    }
}

/// Retry policy for DML, read aggregation and SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Wall-clock budget shared by all attempts of one statement
    pub dml_timeout: Duration,

    /// Fixed pause between attempts
    pub dml_retry_interval: Duration,

    /// Attempts of the pre-execution SELECT retry
    pub select_max_attempts: u32,

    /// First backoff of the pre-execution SELECT retry, doubled per attempt
    pub select_retry_base: Duration,

    /// Warn every this many failed pipeline construction attempts
    pub pipeline_warn_every: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            dml_timeout: Duration::from_secs(30),
            dml_retry_interval: Duration::from_millis(200),
            select_max_attempts: 8,
            select_retry_base: Duration::from_millis(100),
            pipeline_warn_every: 20,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.select_max_attempts == 0 {
            return Err(ExecutionError::InvalidInput(
                "select_max_attempts must be positive".to_string(),
            ));
        }
        if self.pipeline_warn_every == 0 {
            return Err(ExecutionError::InvalidInput(
                "pipeline_warn_every must be positive".to_string(),
            ));
        }
        if self.dml_retry_interval > self.dml_timeout {
            return Err(ExecutionError::InvalidInput(format!(
                "dml_retry_interval ({:?}) exceeds dml_timeout ({:?})",
                self.dml_retry_interval, self.dml_timeout
            )));
        }
        Ok(())
    }
}

/// Node settings reported by SHOW CONFIGS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlNodeSettings {
    pub logging_format: String,
    pub logging_max_size: u64,
    pub logging_max_num: u32,
    pub logging_max_age: u32,
    pub logging_compress_enabled: bool,
    pub logging_path: String,
    pub meta_join: Vec<String>,
    pub ignore_empty_tag: bool,
    pub report_enable: bool,
    pub cluster_id: String,
    pub cpu_num: usize,
    pub memory_size: u64,
    pub write_timeout: Duration,
    pub max_concurrent_queries: usize,
    pub query_timeout: Duration,
    pub log_queries_after: Duration,
    pub shard_writer_timeout: Duration,
    pub shard_mapper_timeout: Duration,
    pub time_range_limit: Vec<Duration>,
    pub tag_limit: usize,
    pub continuous_query_enabled: bool,
    pub continuous_query_run_interval: Duration,
}

impl Default for SqlNodeSettings {
    fn default() -> Self {
        Self {
            logging_format: "auto".to_string(),
            logging_max_size: 64 * 1024 * 1024, // 64MB
            logging_max_num: 16,
            logging_max_age: 7,
            logging_compress_enabled: true,
            logging_path: "/var/log/tsqlcore".to_string(),
            meta_join: Vec::new(),
            ignore_empty_tag: false,
            report_enable: true,
            cluster_id: String::new(),
            cpu_num: 0,
            memory_size: 0,
            write_timeout: Duration::from_secs(10),
            max_concurrent_queries: 0,
            query_timeout: Duration::ZERO,
            log_queries_after: Duration::ZERO,
            shard_writer_timeout: Duration::from_secs(10),
            shard_mapper_timeout: Duration::from_secs(10),
            time_range_limit: Vec::new(),
            tag_limit: 0,
            continuous_query_enabled: false,
            continuous_query_run_interval: Duration::from_secs(1),
        }
    }
}

impl SqlNodeSettings {
    /// `(name, value)` pairs in SHOW CONFIGS order
    pub fn entries(&self, config: &CoordinatorConfig) -> Vec<(&'static str, Value)> {
        let duration = |d: &Duration| Value::from(format_duration(d));
        vec![
            ("logging.format", Value::from(self.logging_format.as_str())),
            ("logging.max.size", Value::from(self.logging_max_size)),
            ("logging.max.num", Value::from(u64::from(self.logging_max_num))),
            ("logging.max.age", Value::from(u64::from(self.logging_max_age))),
            ("logging.compress.enabled", Value::from(self.logging_compress_enabled)),
            ("logging.path", Value::from(self.logging_path.as_str())),
            ("meta.join", Value::from(self.meta_join.clone())),
            ("ignore.empty.tag", Value::from(self.ignore_empty_tag)),
            ("report.enable", Value::from(self.report_enable)),
            ("cluster.id", Value::from(self.cluster_id.as_str())),
            ("cpu.num", Value::from(self.cpu_num)),
            ("memory.size", Value::from(self.memory_size)),
            ("write.timeout", duration(&self.write_timeout)),
            ("max.query.mem", Value::from(config.max_query_mem)),
            ("max.concurrent.queries", Value::from(self.max_concurrent_queries)),
            ("query.timeout", duration(&self.query_timeout)),
            ("query.time.compare.enabled", Value::from(config.query_time_compare_enabled)),
            ("log.queries.after", duration(&self.log_queries_after)),
            ("shard.writer.timeout", duration(&self.shard_writer_timeout)),
            ("shard.mapper.timeout", duration(&self.shard_mapper_timeout)),
            ("rp.limit", Value::from(config.retention_policy_limit)),
            (
                "time.range.limit",
                Value::from(
                    self.time_range_limit
                        .iter()
                        .map(format_duration)
                        .collect::<Vec<_>>(),
                ),
            ),
            ("tag.limit", Value::from(self.tag_limit)),
            ("continuous_queries.enabled", Value::from(self.continuous_query_enabled)),
            (
                "continuous_queries.run_interval",
                duration(&self.continuous_query_run_interval),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.dml_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.select_max_attempts, 8);
        assert_eq!(config.retention_policy_limit, 100);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = CoordinatorConfig::from_json_str(
            r#"{"hostname": "sql-1", "subscription_enabled": true}"#,
        )
        .unwrap();
        assert_eq!(config.hostname, "sql-1");
        assert!(config.subscription_enabled);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(CoordinatorConfig::from_json_str("{").is_err());
        assert!(CoordinatorConfig::from_json_str(r#"{"retention_policy_limit": 0}"#).is_err());

        let mut config = CoordinatorConfig::default();
        config.retry.dml_retry_interval = Duration::from_secs(60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_entries_report_durations() {
        let config = CoordinatorConfig::default();
        let entries = config.sql.entries(&config);
        let write_timeout = entries
            .iter()
            .find(|(name, _)| *name == "write.timeout")
            .map(|(_, value)| value.clone());
        assert_eq!(write_timeout, Some(Value::from("10s")));
        assert!(entries.iter().any(|(name, _)| *name == "rp.limit"));
    }
}
