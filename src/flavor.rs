use std::fmt;
use std::str::FromStr;

use crate::error::SqlBatchError;

/// How a select-like statement's rows are pulled from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Every row with all columns.
    Rows,
    /// A single column of every row.
    Column(usize),
    /// First column as key, second as value.
    KeyPair,
    /// Rows keyed by their first column.
    Unique,
}

/// Shape of the value a [`query`](crate::engine::BatchEngine::query) call returns.
///
/// ```rust
/// use sql_batch::prelude::*;
///
/// assert_eq!(Flavor::default(), Flavor::Bool);
/// assert_eq!("column".parse::<Flavor>().unwrap(), Flavor::Column(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    /// `true` once the batch completed.
    #[default]
    Bool,
    /// Last inserted id of a single `INSERT`.
    Increment,
    /// Total affected rows across the batch.
    Affected,
    /// Every row.
    All,
    /// One column of every row.
    Column(usize),
    /// First row, or none.
    Row,
    /// First column of the first row, or none.
    Value,
    /// First column mapped to second column.
    Pair,
    /// Rows keyed by first column.
    Unique,
    /// First column of the first row as an integer, zero when absent.
    Count,
    /// Whether any row came back.
    Check,
}

impl Flavor {
    /// Stable lowercase name, as used in error messages and the CLI.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Flavor::Bool => "bool",
            Flavor::Increment => "increment",
            Flavor::Affected => "affected",
            Flavor::All => "all",
            Flavor::Column(_) => "column",
            Flavor::Row => "row",
            Flavor::Value => "value",
            Flavor::Pair => "pair",
            Flavor::Unique => "unique",
            Flavor::Count => "count",
            Flavor::Check => "check",
        }
    }

    /// Whether this flavor can be served by a batch of `batch_len` statements.
    /// `select_like` and `insert` describe the statement when there is only one.
    #[must_use]
    pub fn is_compatible(self, batch_len: usize, select_like: bool, insert: bool) -> bool {
        if batch_len > 1 {
            return matches!(self, Flavor::Bool | Flavor::Affected);
        }
        if select_like {
            return !matches!(self, Flavor::Increment);
        }
        match self {
            Flavor::Bool | Flavor::Affected => true,
            Flavor::Increment => insert,
            _ => false,
        }
    }

    /// Fetch shape used when the statement is select-like.
    #[must_use]
    pub fn fetch_mode(self) -> FetchMode {
        match self {
            Flavor::Column(idx) => FetchMode::Column(idx),
            Flavor::Value | Flavor::Count | Flavor::Check => FetchMode::Column(0),
            Flavor::Pair => FetchMode::KeyPair,
            Flavor::Unique => FetchMode::Unique,
            Flavor::Bool
            | Flavor::Increment
            | Flavor::Affected
            | Flavor::All
            | Flavor::Row => FetchMode::Rows,
        }
    }

    /// True when the flavor wants at most one row back.
    #[must_use]
    pub fn wants_single_row(self) -> bool {
        matches!(self, Flavor::Row)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Column(idx) if *idx > 0 => write!(f, "column({idx})"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Flavor {
    type Err = SqlBatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" => Ok(Flavor::Bool),
            "increment" => Ok(Flavor::Increment),
            "affected" => Ok(Flavor::Affected),
            "all" => Ok(Flavor::All),
            "column" => Ok(Flavor::Column(0)),
            "row" => Ok(Flavor::Row),
            "value" => Ok(Flavor::Value),
            "pair" => Ok(Flavor::Pair),
            "unique" => Ok(Flavor::Unique),
            "count" => Ok(Flavor::Count),
            "check" => Ok(Flavor::Check),
            other => Err(SqlBatchError::validation(format!(
                "unknown flavor `{other}`"
            ))),
        }
    }
}
