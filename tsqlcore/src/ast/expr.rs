// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Condition and field expressions carried by parsed statements
//!
//! Expressions are passed through to storage nodes and the pipeline executor
//! untouched. The coordinator only inspects them to strip time predicates
//! (continuous queries) and to find `time(...)` grouping intervals.

use crate::exec::ExecutionError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Binary operators supported in conditions and field expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    EqRegex,
    NeqRegex,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::EqRegex => "=~",
            BinaryOp::NeqRegex => "!~",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Lte
                | BinaryOp::Gt
                | BinaryOp::Gte
        )
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    VarRef(String),
    StringLit(String),
    IntegerLit(i64),
    NumberLit(f64),
    BooleanLit(bool),
    TimeLit(DateTime<Utc>),
    DurationLit(Duration),
    Regex(String),
    Wildcard,
    Call { name: String, args: Vec<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn var(name: &str) -> Self {
        Expr::VarRef(name.to_string())
    }

    pub fn string(value: &str) -> Self {
        Expr::StringLit(value.to_string())
    }

    /// Whether this expression mentions the `time` column anywhere
    pub fn references_time(&self) -> bool {
        match self {
            Expr::VarRef(name) => name.eq_ignore_ascii_case("time"),
            Expr::Call { args, .. } => args.iter().any(Expr::references_time),
            Expr::Binary { lhs, rhs, .. } => lhs.references_time() || rhs.references_time(),
            Expr::Paren(inner) => inner.references_time(),
            _ => false,
        }
    }

    /// Remove time-range predicates, keeping the remaining filter.
    ///
    /// Returns `Ok(None)` when the whole condition was a time filter.
    /// Time predicates under `OR` cannot be separated and are rejected.
    pub fn strip_time_condition(&self) -> Result<Option<Expr>, ExecutionError> {
        match self {
            Expr::Paren(inner) => Ok(inner.strip_time_condition()?.map(|e| match e {
                Expr::Binary { .. } => Expr::Paren(Box::new(e)),
                other => other,
            })),
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let lhs = lhs.strip_time_condition()?;
                    let rhs = rhs.strip_time_condition()?;
                    Ok(match (lhs, rhs) {
                        (Some(l), Some(r)) => Some(Expr::binary(BinaryOp::And, l, r)),
                        (Some(l), None) => Some(l),
                        (None, Some(r)) => Some(r),
                        (None, None) => None,
                    })
                }
                BinaryOp::Or => {
                    if self.references_time() {
                        return Err(ExecutionError::InvalidInput(
                            "cannot use OR with time conditions".to_string(),
                        ));
                    }
                    Ok(Some(self.clone()))
                }
                op if op.is_comparison() && self.references_time() => Ok(None),
                _ => Ok(Some(self.clone())),
            },
            other => Ok(Some(other.clone())),
        }
    }
}

fn quote_ident(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\\\""))
    }
}

pub(crate) fn format_ident(name: &str) -> String {
    quote_ident(name)
}

/// Render a duration the way InfluxQL literals read (1h30m -> "90m")
pub fn format_duration(d: &Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();
    if secs == 0 && nanos == 0 {
        return "0s".to_string();
    }
    if nanos != 0 {
        if nanos % 1_000_000 == 0 {
            return format!("{}ms", d.as_millis());
        }
        if nanos % 1_000 == 0 {
            return format!("{}u", d.as_micros());
        }
        return format!("{}ns", d.as_nanos());
    }
    const UNITS: [(u64, &str); 5] = [
        (7 * 24 * 3600, "w"),
        (24 * 3600, "d"),
        (3600, "h"),
        (60, "m"),
        (1, "s"),
    ];
    for (size, unit) in UNITS {
        if secs % size == 0 {
            return format!("{}{}", secs / size, unit);
        }
    }
    format!("{}s", secs)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::VarRef(name) => write!(f, "{}", quote_ident(name)),
            Expr::StringLit(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Expr::IntegerLit(v) => write!(f, "{}", v),
            Expr::NumberLit(v) => write!(f, "{}", v),
            Expr::BooleanLit(v) => write!(f, "{}", v),
            Expr::TimeLit(t) => write!(f, "'{}'", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Expr::DurationLit(d) => write!(f, "{}", format_duration(d)),
            Expr::Regex(r) => write!(f, "/{}/", r.replace('/', "\\/")),
            Expr::Wildcard => write!(f, "*"),
            Expr::Call { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Expr::Paren(inner) => write!(f, "({})", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_after() -> Expr {
        Expr::binary(
            BinaryOp::Gt,
            Expr::var("time"),
            Expr::Call {
                name: "now".to_string(),
                args: vec![],
            },
        )
    }

    #[test]
    fn test_strip_time_keeps_tag_filter() {
        let cond = Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::Eq, Expr::var("host"), Expr::string("a")),
            time_after(),
        );
        let stripped = cond.strip_time_condition().unwrap();
        assert_eq!(stripped.unwrap().to_string(), "host = 'a'");
    }

    #[test]
    fn test_strip_time_only_condition() {
        assert_eq!(time_after().strip_time_condition().unwrap(), None);
    }

    #[test]
    fn test_strip_time_under_or_rejected() {
        let cond = Expr::binary(
            BinaryOp::Or,
            Expr::binary(BinaryOp::Eq, Expr::var("host"), Expr::string("a")),
            time_after(),
        );
        assert!(cond.strip_time_condition().is_err());
    }

    #[test]
    fn test_display_quotes_identifiers() {
        let cond = Expr::binary(BinaryOp::EqRegex, Expr::var("my-tag"), Expr::Regex("^a".into()));
        assert_eq!(cond.to_string(), "\"my-tag\" =~ /^a/");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(&Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(&Duration::from_secs(7 * 86400)), "1w");
        assert_eq!(format_duration(&Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(&Duration::ZERO), "0s");
    }
}
