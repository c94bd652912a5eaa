// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Render statements back to InfluxQL text
//!
//! Used for read-only advisories, log lines and the stored text of
//! continuous queries.

use super::expr::{format_duration, format_ident};
use super::statement::*;
use std::fmt::{self, Display, Formatter, Write};

fn join<T: Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn idents(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format_ident(i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_on(f: &mut Formatter<'_>, database: &str) -> fmt::Result {
    if !database.is_empty() {
        write!(f, " ON {}", format_ident(database))?;
    }
    Ok(())
}

fn write_from(f: &mut Formatter<'_>, sources: &[MeasurementRef]) -> fmt::Result {
    if !sources.is_empty() {
        write!(f, " FROM {}", join(sources, ", "))?;
    }
    Ok(())
}

fn write_where(f: &mut Formatter<'_>, cond: &Option<super::Expr>) -> fmt::Result {
    if let Some(cond) = cond {
        write!(f, " WHERE {}", cond)?;
    }
    Ok(())
}

fn write_limits(f: &mut Formatter<'_>, limit: usize, offset: usize) -> fmt::Result {
    if limit > 0 {
        write!(f, " LIMIT {}", limit)?;
    }
    if offset > 0 {
        write!(f, " OFFSET {}", offset)?;
    }
    Ok(())
}

fn write_cardinality(f: &mut Formatter<'_>, what: &str, stmt: &CardinalityStatement) -> fmt::Result {
    write!(f, "SHOW {} ", what)?;
    if stmt.exact {
        write!(f, "EXACT ")?;
    }
    write!(f, "CARDINALITY")?;
    write_on(f, &stmt.database)?;
    write_from(f, &stmt.sources)?;
    write_where(f, &stmt.condition)?;
    if !stmt.dimensions.is_empty() {
        write!(f, " GROUP BY {}", join(&stmt.dimensions, ", "))?;
    }
    Ok(())
}

impl Display for MeasurementRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if !self.database.is_empty() {
            write!(out, "{}.", format_ident(&self.database))?;
        }
        if !self.retention_policy.is_empty() {
            write!(out, "{}", format_ident(&self.retention_policy))?;
        }
        if !self.database.is_empty() || !self.retention_policy.is_empty() {
            out.push('.');
        }
        match &self.regex {
            Some(regex) => write!(out, "/{}/", regex)?,
            None => write!(out, "{}", format_ident(&self.name))?,
        }
        f.write_str(&out)
    }
}

impl Display for TagKeyFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TagKeyFilter::Eq(key) => write!(f, "KEY = {}", format_ident(key)),
            TagKeyFilter::Neq(key) => write!(f, "KEY != {}", format_ident(key)),
            TagKeyFilter::In(keys) => write!(f, "KEY IN ({})", idents(keys)),
            TagKeyFilter::Regex(re) => write!(f, "KEY =~ /{}/", re),
            TagKeyFilter::NotRegex(re) => write!(f, "KEY !~ /{}/", re),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Boolean(v) => write!(f, "{}", v),
        }
    }
}

impl Display for SelectStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|field| match &field.alias {
                Some(alias) => format!("{} AS {}", field.expr, format_ident(alias)),
                None => field.expr.to_string(),
            })
            .collect();
        write!(f, "SELECT {}", fields.join(", "))?;
        if let Some(target) = &self.target {
            write!(f, " INTO {}", target)?;
        }
        write_from(f, &self.sources)?;
        write_where(f, &self.condition)?;
        if !self.dimensions.is_empty() {
            write!(f, " GROUP BY {}", join(&self.dimensions, ", "))?;
        }
        write_limits(f, self.limit, self.offset)?;
        if self.slimit > 0 {
            write!(f, " SLIMIT {}", self.slimit)?;
        }
        if self.soffset > 0 {
            write!(f, " SOFFSET {}", self.soffset)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::AlterRetentionPolicy(s) => {
                write!(f, "ALTER RETENTION POLICY {} ON {}", format_ident(&s.name), format_ident(&s.database))?;
                if let Some(d) = &s.duration {
                    write!(f, " DURATION {}", format_duration(d))?;
                }
                if let Some(d) = &s.shard_group_duration {
                    write!(f, " SHARD DURATION {}", format_duration(d))?;
                }
                if s.default {
                    write!(f, " DEFAULT")?;
                }
                Ok(())
            }
            Statement::AlterShardKey(s) => write!(
                f,
                "ALTER MEASUREMENT {} WITH SHARDKEY {} TYPE {}",
                format_ident(&s.name),
                idents(&s.shard_key),
                s.shard_type
            ),
            Statement::CreateDatabase(s) => {
                write!(f, "CREATE DATABASE {}", format_ident(&s.name))?;
                if s.retention_policy_create {
                    write!(f, " WITH")?;
                    if let Some(d) = &s.retention_policy_duration {
                        write!(f, " DURATION {}", format_duration(d))?;
                    }
                    if let Some(n) = s.retention_policy_replication {
                        write!(f, " REPLICATION {}", n)?;
                    }
                    if !s.retention_policy_name.is_empty() {
                        write!(f, " NAME {}", format_ident(&s.retention_policy_name))?;
                    }
                }
                Ok(())
            }
            Statement::CreateMeasurement(s) => {
                write!(f, "CREATE MEASUREMENT {}", format_ident(&s.name))?;
                if !s.shard_key.is_empty() {
                    write!(f, " WITH SHARDKEY {}", idents(&s.shard_key))?;
                }
                if !s.engine_type.is_empty() {
                    write!(f, " ENGINETYPE = {}", s.engine_type)?;
                }
                Ok(())
            }
            Statement::CreateRetentionPolicy(s) => {
                write!(
                    f,
                    "CREATE RETENTION POLICY {} ON {} DURATION {} REPLICATION 1",
                    format_ident(&s.name),
                    format_ident(&s.database),
                    format_duration(&s.duration)
                )?;
                if s.default {
                    write!(f, " DEFAULT")?;
                }
                Ok(())
            }
            Statement::CreateSubscription(s) => write!(
                f,
                "CREATE SUBSCRIPTION {} ON {}.{} DESTINATIONS {} {}",
                format_ident(&s.name),
                format_ident(&s.database),
                format_ident(&s.retention_policy),
                s.mode,
                s.destinations
                    .iter()
                    .map(|d| format!("'{}'", d))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Statement::CreateContinuousQuery(s) => {
                write!(f, "CREATE CONTINUOUS QUERY {} ON {}", format_ident(&s.name), format_ident(&s.database))?;
                if !s.resample_every.is_zero() || !s.resample_for.is_zero() {
                    write!(f, " RESAMPLE")?;
                    if !s.resample_every.is_zero() {
                        write!(f, " EVERY {}", format_duration(&s.resample_every))?;
                    }
                    if !s.resample_for.is_zero() {
                        write!(f, " FOR {}", format_duration(&s.resample_for))?;
                    }
                }
                write!(f, " BEGIN {} END", s.source)
            }
            Statement::ShowContinuousQueries => write!(f, "SHOW CONTINUOUS QUERIES"),
            Statement::DropContinuousQuery(s) => {
                write!(f, "DROP CONTINUOUS QUERY {} ON {}", format_ident(&s.name), format_ident(&s.database))
            }
            Statement::CreateUser(s) => {
                write!(f, "CREATE USER {} WITH PASSWORD [REDACTED]", format_ident(&s.name))?;
                if s.admin {
                    write!(f, " WITH ALL PRIVILEGES")?;
                }
                Ok(())
            }
            Statement::DeleteSeries(s) => {
                write!(f, "DELETE")?;
                write_from(f, &s.sources)?;
                write_where(f, &s.condition)
            }
            Statement::DropDatabase { name } => write!(f, "DROP DATABASE {}", format_ident(name)),
            Statement::DropMeasurement { name } => {
                write!(f, "DROP MEASUREMENT {}", format_ident(name))
            }
            Statement::DropSeries(s) => {
                write!(f, "DROP SERIES")?;
                write_from(f, &s.sources)?;
                write_where(f, &s.condition)
            }
            Statement::DropRetentionPolicy(s) => write!(
                f,
                "DROP RETENTION POLICY {} ON {}",
                format_ident(&s.name),
                format_ident(&s.database)
            ),
            Statement::DropShard { id } => write!(f, "DROP SHARD {}", id),
            Statement::DropSubscription(s) => write!(
                f,
                "DROP SUBSCRIPTION {} ON {}.{}",
                format_ident(&s.name),
                format_ident(&s.database),
                format_ident(&s.retention_policy)
            ),
            Statement::DropUser { name } => write!(f, "DROP USER {}", format_ident(name)),
            Statement::Explain(s) => {
                write!(f, "EXPLAIN ")?;
                if s.analyze {
                    write!(f, "ANALYZE ")?;
                }
                write!(f, "{}", s.statement)
            }
            Statement::Grant(s) => write!(
                f,
                "GRANT {} ON {} TO {}",
                s.privilege.as_str(),
                format_ident(&s.on),
                format_ident(&s.user)
            ),
            Statement::GrantAdmin { user } => {
                write!(f, "GRANT ALL PRIVILEGES TO {}", format_ident(user))
            }
            Statement::Revoke(s) => write!(
                f,
                "REVOKE {} ON {} FROM {}",
                s.privilege.as_str(),
                format_ident(&s.on),
                format_ident(&s.user)
            ),
            Statement::RevokeAdmin { user } => {
                write!(f, "REVOKE ALL PRIVILEGES FROM {}", format_ident(user))
            }
            Statement::ShowDatabases { show_detail } => {
                write!(f, "SHOW DATABASES")?;
                if *show_detail {
                    write!(f, " DETAIL")?;
                }
                Ok(())
            }
            Statement::ShowDiagnostics { module } => {
                write!(f, "SHOW DIAGNOSTICS")?;
                if !module.is_empty() {
                    write!(f, " FOR '{}'", module)?;
                }
                Ok(())
            }
            Statement::ShowGrantsForUser { name } => {
                write!(f, "SHOW GRANTS FOR {}", format_ident(name))
            }
            Statement::ShowMeasurementKeys(s) => {
                write!(f, "SHOW {}", s.name)?;
                write_on(f, &s.database)?;
                write!(f, " FROM {}", format_ident(&s.measurement))
            }
            Statement::ShowMeasurements(s) => {
                write!(f, "SHOW MEASUREMENTS")?;
                write_on(f, &s.database)?;
                if let Some(source) = &s.source {
                    write!(f, " WITH MEASUREMENT = {}", source)?;
                }
                write_where(f, &s.condition)?;
                write_limits(f, s.limit, s.offset)
            }
            Statement::ShowMeasurementCardinality(s) => write_cardinality(f, "MEASUREMENT", s),
            Statement::ShowRetentionPolicies { database } => {
                write!(f, "SHOW RETENTION POLICIES")?;
                write_on(f, database)
            }
            Statement::ShowSeriesCardinality(s) => write_cardinality(f, "SERIES", s),
            Statement::ShowShards => write!(f, "SHOW SHARDS"),
            Statement::ShowShardGroups => write!(f, "SHOW SHARD GROUPS"),
            Statement::ShowSubscriptions => write!(f, "SHOW SUBSCRIPTIONS"),
            Statement::ShowFieldKeys(s) => {
                write!(f, "SHOW FIELD KEYS")?;
                write_on(f, &s.database)?;
                write_from(f, &s.sources)?;
                write_limits(f, s.limit, s.offset)
            }
            Statement::ShowFieldKeyCardinality(s) => write_cardinality(f, "FIELD KEY", s),
            Statement::ShowTagKeys(s) => {
                write!(f, "SHOW TAG KEYS")?;
                write_on(f, &s.database)?;
                write_from(f, &s.sources)?;
                write_where(f, &s.condition)?;
                write_limits(f, s.limit, s.offset)
            }
            Statement::ShowTagKeyCardinality(s) => write_cardinality(f, "TAG KEY", s),
            Statement::ShowTagValues(s) => {
                write!(f, "SHOW TAG VALUES")?;
                write_on(f, &s.database)?;
                write_from(f, &s.sources)?;
                write!(f, " WITH {}", s.tag_key)?;
                write_where(f, &s.condition)?;
                write_limits(f, s.limit, s.offset)
            }
            Statement::ShowSeries(s) => {
                write!(f, "SHOW SERIES")?;
                write_on(f, &s.database)?;
                write_from(f, &s.sources)?;
                write_where(f, &s.condition)?;
                write_limits(f, s.limit, s.offset)
            }
            Statement::ShowTagValuesCardinality(s) => {
                write!(f, "SHOW TAG VALUES ")?;
                if s.exact {
                    write!(f, "EXACT ")?;
                }
                write!(f, "CARDINALITY")?;
                write_on(f, &s.database)?;
                write_from(f, &s.sources)?;
                write!(f, " WITH {}", s.tag_key)?;
                write_where(f, &s.condition)
            }
            Statement::ShowUsers => write!(f, "SHOW USERS"),
            Statement::SetPasswordUser { name, .. } => {
                write!(f, "SET PASSWORD FOR {} = [REDACTED]", format_ident(name))
            }
            Statement::ShowQueries => write!(f, "SHOW QUERIES"),
            Statement::KillQuery(s) => {
                write!(f, "KILL QUERY {}", s.query_id)?;
                if !s.host.is_empty() {
                    write!(f, " ON {}", format_ident(&s.host))?;
                }
                Ok(())
            }
            Statement::PrepareSnapshot => write!(f, "PREPARE SNAPSHOT"),
            Statement::EndPrepareSnapshot => write!(f, "END PREPARE SNAPSHOT"),
            Statement::GetRuntimeInfo => write!(f, "GET RUNTIMEINFO"),
            Statement::CreateDownSample(s) => {
                let ops: Vec<String> = s
                    .ops
                    .iter()
                    .map(|op| format!("{}({})", op.function, op.data_type))
                    .collect();
                write!(
                    f,
                    "CREATE DOWNSAMPLE ON {}.{} ({}) WITH DURATION {}",
                    format_ident(&s.db_name),
                    format_ident(&s.rp_name),
                    ops.join(", "),
                    format_duration(&s.duration)
                )
            }
            Statement::DropDownSample(s) => {
                if s.drop_all {
                    write!(f, "DROP DOWNSAMPLES ON {}", format_ident(&s.db_name))
                } else {
                    write!(f, "DROP DOWNSAMPLE ON {}.{}", format_ident(&s.db_name), format_ident(&s.rp_name))
                }
            }
            Statement::ShowDownSample { db_name } => {
                write!(f, "SHOW DOWNSAMPLES")?;
                write_on(f, db_name)
            }
            Statement::CreateStream(s) => write!(
                f,
                "CREATE STREAM {} INTO {} ON {} DELAY {}",
                format_ident(&s.name),
                s.target,
                s.query,
                format_duration(&s.delay)
            ),
            Statement::ShowStreams { database } => {
                write!(f, "SHOW STREAMS")?;
                write_on(f, database)
            }
            Statement::DropStream { name } => write!(f, "DROP STREAM {}", format_ident(name)),
            Statement::ShowConfigs => write!(f, "SHOW CONFIGS"),
            Statement::SetConfig(s) => {
                write!(f, "SET CONFIG {} '{}' = {}", s.component, s.key, s.value)
            }
            Statement::ShowStats { module } => {
                write!(f, "SHOW STATS")?;
                if !module.is_empty() {
                    write!(f, " FOR '{}'", module)?;
                }
                Ok(())
            }
            Statement::Select(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr};
    use std::time::Duration;

    #[test]
    fn test_select_display() {
        let stmt = SelectStatement {
            fields: vec![SelectField {
                expr: Expr::Call {
                    name: "mean".to_string(),
                    args: vec![Expr::var("value")],
                },
                alias: None,
            }],
            sources: vec![MeasurementRef {
                database: "db0".to_string(),
                retention_policy: "autogen".to_string(),
                name: "cpu".to_string(),
                ..Default::default()
            }],
            condition: Some(Expr::binary(
                BinaryOp::Eq,
                Expr::var("host"),
                Expr::string("a"),
            )),
            dimensions: vec![Expr::Call {
                name: "time".to_string(),
                args: vec![Expr::DurationLit(Duration::from_secs(300))],
            }],
            limit: 10,
            ..Default::default()
        };
        assert_eq!(
            stmt.to_string(),
            "SELECT mean(value) FROM db0.autogen.cpu WHERE host = 'a' GROUP BY time(5m) LIMIT 10"
        );
    }

    #[test]
    fn test_measurement_ref_with_rp_only() {
        let m = MeasurementRef {
            retention_policy: "rp1".to_string(),
            name: "mem".to_string(),
            ..Default::default()
        };
        assert_eq!(m.to_string(), "rp1.mem");
    }

    #[test]
    fn test_password_redacted() {
        let stmt = Statement::SetPasswordUser {
            name: "bob".to_string(),
            password: "secret".to_string(),
        };
        assert!(!stmt.to_string().contains("secret"));
    }
}
