use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Value;

use super::config::SharedSqliteConnection;
use super::params::row_value_to_sqlite_value;
use super::query::build_result_set;
use super::{driver_error, run_blocking};
use crate::binder::Placeholder;
use crate::driver::{DriverError, PreparedStatement};
use crate::flavor::FetchMode;
use crate::results::{Fetched, ResultSet};
use crate::types::RowValues;

/// A statement prepared on a [`SqliteConnection`](super::SqliteConnection).
///
/// Rows are always buffered: `execute` steps the statement to completion on a
/// blocking worker and keeps the result until `fetch` or `close_cursor`.
pub struct SqlitePrepared {
    handle: SharedSqliteConnection,
    sql: Arc<String>,
    /// Name of each 1-based parameter, `None` for anonymous `?`.
    parameters: Vec<Option<String>>,
    returns_rows: bool,
    bound: BTreeMap<usize, (Placeholder, RowValues)>,
    rows_affected: u64,
    result: Option<ResultSet>,
}

impl SqlitePrepared {
    pub(crate) fn new(
        handle: SharedSqliteConnection,
        sql: Arc<String>,
        parameters: Vec<Option<String>>,
        returns_rows: bool,
    ) -> Self {
        Self {
            handle,
            sql,
            parameters,
            returns_rows,
            bound: BTreeMap::new(),
            rows_affected: 0,
            result: None,
        }
    }

    /// 1-based index of `:name`, `@name` or `$name`.
    fn named_index(&self, name: &str) -> Option<usize> {
        self.parameters
            .iter()
            .position(|param| {
                param
                    .as_deref()
                    .and_then(|p| p.get(1..))
                    .is_some_and(|p| p == name)
            })
            .map(|pos| pos + 1)
    }
}

#[async_trait]
impl PreparedStatement for SqlitePrepared {
    fn bind(&mut self, placeholder: &Placeholder, value: RowValues) -> Result<(), DriverError> {
        let idx = match placeholder {
            Placeholder::Named(name) => match self.named_index(name) {
                Some(idx) => idx,
                None => {
                    tracing::trace!(%placeholder, "statement has no such parameter; skipped");
                    return Ok(());
                }
            },
            Placeholder::Positional(idx) => {
                if *idx == 0 || *idx > self.parameters.len() {
                    return Err(DriverError::new(format!(
                        "positional parameter {placeholder} out of range; statement takes {}",
                        self.parameters.len()
                    )));
                }
                *idx
            }
        };
        self.bound.insert(idx, (placeholder.clone(), value));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), DriverError> {
        let sql = Arc::clone(&self.sql);
        let values: Vec<(usize, Value)> = self
            .bound
            .iter()
            .map(|(idx, (_, value))| (*idx, row_value_to_sqlite_value(value)))
            .collect();
        let returns_rows = self.returns_rows;
        let (affected, result) = run_blocking(Arc::clone(&self.handle), move |guard| {
            let mut stmt = guard.prepare_cached(&sql).map_err(driver_error)?;
            for (idx, value) in values {
                stmt.raw_bind_parameter(idx, value).map_err(driver_error)?;
            }
            if returns_rows {
                let rs = build_result_set(&mut stmt)?;
                let affected = if stmt.readonly() {
                    0
                } else {
                    u64::try_from(guard.changes()).unwrap_or(u64::MAX)
                };
                Ok((affected, Some(rs)))
            } else {
                let affected = stmt.raw_execute().map_err(driver_error)?;
                Ok((u64::try_from(affected).unwrap_or(u64::MAX), None))
            }
        })
        .await?;
        self.rows_affected = affected;
        self.result = result;
        Ok(())
    }

    async fn fetch(&mut self, mode: FetchMode) -> Result<Fetched, DriverError> {
        Fetched::from_result_set(self.result.take().unwrap_or_default(), mode)
    }

    fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    async fn close_cursor(&mut self) -> Result<(), DriverError> {
        self.result = None;
        Ok(())
    }

    fn debug_dump(&self) -> String {
        let mut dump = format!("SQL: [{}] {}\nParams: {}", self.sql.len(), self.sql, self.bound.len());
        for (idx, (placeholder, value)) in &self.bound {
            let _ = write!(dump, "\nKey: {placeholder} (#{idx}) = {}", value.to_json());
        }
        dump
    }
}
