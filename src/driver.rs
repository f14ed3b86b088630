//! The seam between the engine and a concrete database driver.
//!
//! The engine only ever talks to a [`Connection`] and the
//! [`PreparedStatement`]s it hands out. Backends (see the `sqlite` module)
//! implement these traits; tests use a scripted implementation.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::binder::Placeholder;
use crate::error::SqlBatchError;
use crate::flavor::FetchMode;
use crate::results::Fetched;
use crate::types::{Dialect, RowValues};

/// Driver-neutral failure reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{message}", code_prefix(.sqlstate, .code))]
pub struct DriverError {
    /// Five-character SQLSTATE, when the driver reports one.
    pub sqlstate: Option<String>,
    /// Native driver error code.
    pub code: Option<i64>,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sqlstate: None,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

fn code_prefix(sqlstate: &Option<String>, code: &Option<i64>) -> String {
    match (sqlstate, code) {
        (Some(state), Some(code)) => format!("[{state}] ({code}) "),
        (Some(state), None) => format!("[{state}] "),
        (None, Some(code)) => format!("({code}) "),
        (None, None) => String::new(),
    }
}

/// Per-statement preparation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrepareOptions {
    /// Materialize the whole result before returning from `execute`.
    pub buffered: bool,
}

/// A statement prepared on a [`Connection`].
#[async_trait]
pub trait PreparedStatement: Send {
    /// Bind one resolved value.
    ///
    /// # Errors
    /// Returns `DriverError` if the value cannot be bound. Named placeholders
    /// the statement does not mention are ignored.
    fn bind(&mut self, placeholder: &Placeholder, value: RowValues) -> Result<(), DriverError>;

    /// Run the statement with its current bindings.
    async fn execute(&mut self) -> Result<(), DriverError>;

    /// Pull the rows produced by the last `execute`.
    async fn fetch(&mut self, mode: FetchMode) -> Result<Fetched, DriverError>;

    /// Rows changed by the last `execute`.
    fn rows_affected(&self) -> u64;

    /// Release driver-side cursor resources; safe to call more than once.
    async fn close_cursor(&mut self) -> Result<(), DriverError>;

    /// Human-readable dump of the statement and its bound parameters.
    fn debug_dump(&self) -> String;
}

/// A live connection. The engine borrows it for a call and never closes it.
#[async_trait]
pub trait Connection: Send {
    fn dialect(&self) -> Dialect;

    async fn prepare(
        &mut self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError>;

    async fn begin(&mut self) -> Result<(), DriverError>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;

    fn in_transaction(&self) -> bool;

    /// Id generated by the most recent insert, `Ok(None)` when the driver
    /// cannot supply one.
    async fn last_insert_id(&mut self) -> Result<Option<String>, DriverError>;

    /// Advisory limit on how long a single statement may run.
    fn set_max_run_time(&mut self, _limit: Duration) {}
}

/// Source of connections when none was supplied to the engine.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// # Errors
    /// Returns `SqlBatchError::ConnectionError` if no connection can be opened.
    async fn acquire(&self) -> Result<Box<dyn Connection>, SqlBatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_codes() {
        let err = DriverError::new("Deadlock found")
            .with_sqlstate("40001")
            .with_code(1213);
        assert_eq!(err.to_string(), "[40001] (1213) Deadlock found");
        assert_eq!(DriverError::new("plain").to_string(), "plain");
    }
}
