// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Default database and retention policy filling

use super::StatementExecutor;
use crate::ast::{MeasurementRef, SelectStatement, Statement};
use crate::exec::ExecutionError;
use crate::meta::MetaClient;

/// Defaults a statement is normalized against
struct Defaults<'a> {
    meta: &'a dyn MetaClient,
    database: &'a str,
    retention_policy: &'a str,
}

impl Defaults<'_> {
    fn database(&self, database: &mut String) {
        if database.is_empty() {
            *database = self.database.to_string();
        }
    }

    fn measurement(&self, m: &mut MeasurementRef) -> Result<(), ExecutionError> {
        // Targets may be blank, they inherit the source measurement name
        if !m.is_target && m.name.is_empty() && m.regex.is_none() {
            return Err(ExecutionError::InvalidInput("invalid measurement".to_string()));
        }
        self.database(&mut m.database);
        if m.database.is_empty() {
            return Err(ExecutionError::DatabaseNameRequired);
        }
        let db = self.meta.database(&m.database)?;
        if m.retention_policy.is_empty() {
            if !self.retention_policy.is_empty() {
                m.retention_policy = self.retention_policy.to_string();
            } else if !db.default_retention_policy.is_empty() {
                m.retention_policy = db.default_retention_policy;
            } else {
                return Err(ExecutionError::InvalidInput(format!(
                    "default retention policy not set for: {}",
                    db.name
                )));
            }
        }
        Ok(())
    }

    fn measurements(&self, sources: &mut [MeasurementRef]) -> Result<(), ExecutionError> {
        sources.iter_mut().try_for_each(|m| self.measurement(m))
    }

    fn select(&self, select: &mut SelectStatement) -> Result<(), ExecutionError> {
        self.measurements(&mut select.sources)?;
        if let Some(target) = select.target.as_mut() {
            self.measurement(target)?;
        }
        Ok(())
    }

    fn statement(&self, stmt: &mut Statement) -> Result<(), ExecutionError> {
        match stmt {
            Statement::ShowRetentionPolicies { database } => self.database(database),
            Statement::ShowMeasurements(s) => {
                self.database(&mut s.database);
                if let Some(source) = s.source.as_mut() {
                    self.measurement(source)?;
                }
            }
            Statement::ShowFieldKeys(s) => {
                self.database(&mut s.database);
                self.measurements(&mut s.sources)?;
            }
            Statement::ShowTagKeys(s) => {
                self.database(&mut s.database);
                self.measurements(&mut s.sources)?;
            }
            Statement::ShowTagValues(s) => {
                self.database(&mut s.database);
                self.measurements(&mut s.sources)?;
            }
            Statement::ShowTagValuesCardinality(s) => {
                self.database(&mut s.database);
                self.measurements(&mut s.sources)?;
            }
            Statement::ShowSeries(s) => {
                self.database(&mut s.database);
                self.measurements(&mut s.sources)?;
            }
            Statement::ShowFieldKeyCardinality(s)
            | Statement::ShowTagKeyCardinality(s)
            | Statement::ShowMeasurementCardinality(s)
            | Statement::ShowSeriesCardinality(s) => {
                self.database(&mut s.database);
                self.measurements(&mut s.sources)?;
            }
            Statement::CreateMeasurement(s) => self.database(&mut s.database),
            Statement::AlterShardKey(s) => self.database(&mut s.database),
            Statement::ShowMeasurementKeys(s) => self.database(&mut s.database),
            Statement::CreateDownSample(s) => self.database(&mut s.db_name),
            Statement::DropDownSample(s) => self.database(&mut s.db_name),
            Statement::ShowDownSample { db_name } => self.database(db_name),
            Statement::CreateStream(s) => {
                self.measurement(&mut s.target)?;
                self.statement(&mut s.query)?;
            }
            Statement::CreateContinuousQuery(s) => self.select(&mut s.source)?,
            Statement::Explain(s) => self.select(&mut s.statement)?,
            Statement::Select(s) => self.select(s)?,
            // Database and retention policy are not part of these statements
            Statement::DropSeries(_) | Statement::DeleteSeries(_) => {}
            _ => {}
        }
        Ok(())
    }
}

/// Return `stmt` with the default database filled into statements that name
/// one and every measurement source qualified with database and retention
/// policy. `default_retention_policy` may be empty, the database's default
/// retention policy is used then.
pub fn normalize_statement(
    meta: &dyn MetaClient,
    stmt: &Statement,
    default_database: &str,
    default_retention_policy: &str,
) -> Result<Statement, ExecutionError> {
    let defaults = Defaults {
        meta,
        database: default_database,
        retention_policy: default_retention_policy,
    };
    let mut normalized = stmt.clone();
    defaults.statement(&mut normalized)?;
    Ok(normalized)
}

impl StatementExecutor {
    pub fn normalize_statement(
        &self,
        stmt: &Statement,
        default_database: &str,
        default_retention_policy: &str,
    ) -> Result<Statement, ExecutionError> {
        normalize_statement(
            self.meta.as_ref(),
            stmt,
            default_database,
            default_retention_policy,
        )
    }
}
