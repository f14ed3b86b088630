//! A scripted in-memory [`Connection`] for exercising the engine without a
//! database.
//!
//! ```rust
//! use sql_batch::driver::DriverError;
//! use sql_batch::test_utils::ScriptedConnection;
//! use sql_batch::types::Dialect;
//!
//! let conn = ScriptedConnection::new(Dialect::Mysql)
//!     .fail_on("UPDATE", DriverError::new("Deadlock found").with_code(1213), 1);
//! let tracker = conn.tracker();
//! assert_eq!(tracker.snapshot().executes.len(), 0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::binder::Placeholder;
use crate::classify::is_select_like;
use crate::driver::{Connection, DriverError, PrepareOptions, PreparedStatement};
use crate::flavor::FetchMode;
use crate::results::{Fetched, ResultSet};
use crate::types::{Dialect, RowValues};

/// Everything a [`ScriptedConnection`] was asked to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// Statement text of every `prepare`, in order.
    pub prepares: Vec<String>,
    /// Statement text of every `execute`, in order, failed ones included.
    pub executes: Vec<String>,
    /// Bindings seen by each successful `execute`.
    pub bound: Vec<Vec<(Placeholder, RowValues)>>,
    pub cursor_closes: usize,
    pub max_run_time: Option<Duration>,
    pub prepare_options: Vec<PrepareOptions>,
}

impl CallLog {
    /// Total driver interactions of any kind.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.begins + self.commits + self.rollbacks + self.prepares.len() + self.executes.len()
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    fragment: String,
    error: DriverError,
    remaining: usize,
}

#[derive(Debug, Default)]
struct Script {
    failures: Vec<FailureRule>,
    rows: Vec<(String, ResultSet)>,
    affected: Vec<(String, u64)>,
    commit_failures: Vec<DriverError>,
    begin_failures: Vec<DriverError>,
    rollback_error: Option<DriverError>,
    log: CallLog,
    next_insert_id: i64,
}

type Shared = Arc<Mutex<Script>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Script> {
    shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Read access to a [`ScriptedConnection`]'s call log after it was handed
/// to an engine.
#[derive(Debug, Clone)]
pub struct CallTracker(Shared);

impl CallTracker {
    #[must_use]
    pub fn snapshot(&self) -> CallLog {
        lock(&self.0).log.clone()
    }
}

/// In-memory connection driven by simple text-fragment rules.
///
/// Statements containing a registered fragment fail, return rows, or report
/// affected rows as scripted. Everything else succeeds, affecting one row
/// unless select-like.
#[derive(Debug)]
pub struct ScriptedConnection {
    dialect: Dialect,
    shared: Shared,
    in_transaction: bool,
    supports_last_insert_id: bool,
}

impl ScriptedConnection {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            shared: Arc::default(),
            in_transaction: false,
            supports_last_insert_id: true,
        }
    }

    /// Fail the next `times` executions of statements containing `fragment`.
    #[must_use]
    pub fn fail_on(self, fragment: &str, error: DriverError, times: usize) -> Self {
        lock(&self.shared).failures.push(FailureRule {
            fragment: fragment.to_string(),
            error,
            remaining: times,
        });
        self
    }

    #[must_use]
    pub fn with_rows(self, fragment: &str, rows: ResultSet) -> Self {
        lock(&self.shared).rows.push((fragment.to_string(), rows));
        self
    }

    #[must_use]
    pub fn with_affected(self, fragment: &str, affected: u64) -> Self {
        lock(&self.shared).affected.push((fragment.to_string(), affected));
        self
    }

    /// Fail the next commit with `error`.
    #[must_use]
    pub fn fail_commit(self, error: DriverError) -> Self {
        lock(&self.shared).commit_failures.push(error);
        self
    }

    /// Fail the next begin with `error`.
    #[must_use]
    pub fn fail_begin(self, error: DriverError) -> Self {
        lock(&self.shared).begin_failures.push(error);
        self
    }

    /// Make every rollback fail with `error`.
    #[must_use]
    pub fn fail_rollback(self, error: DriverError) -> Self {
        lock(&self.shared).rollback_error = Some(error);
        self
    }

    /// Report `Ok(None)` from `last_insert_id`.
    #[must_use]
    pub fn without_last_insert_id(mut self) -> Self {
        self.supports_last_insert_id = false;
        self
    }

    /// Pretend the caller already opened a transaction.
    #[must_use]
    pub fn in_open_transaction(mut self) -> Self {
        self.in_transaction = true;
        self
    }

    #[must_use]
    pub fn tracker(&self) -> CallTracker {
        CallTracker(Arc::clone(&self.shared))
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn prepare(
        &mut self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError> {
        let mut script = lock(&self.shared);
        script.log.prepares.push(sql.to_string());
        script.log.prepare_options.push(options);
        Ok(Box::new(ScriptedStatement {
            sql: sql.to_string(),
            shared: Arc::clone(&self.shared),
            bound: Vec::new(),
            affected: 0,
            result: None,
        }))
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        let mut script = lock(&self.shared);
        script.log.begins += 1;
        if !script.begin_failures.is_empty() {
            return Err(script.begin_failures.remove(0));
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        let mut script = lock(&self.shared);
        script.log.commits += 1;
        if !script.commit_failures.is_empty() {
            return Err(script.commit_failures.remove(0));
        }
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        let mut script = lock(&self.shared);
        script.log.rollbacks += 1;
        self.in_transaction = false;
        match &script.rollback_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn last_insert_id(&mut self) -> Result<Option<String>, DriverError> {
        if !self.supports_last_insert_id {
            return Ok(None);
        }
        Ok(Some(lock(&self.shared).next_insert_id.to_string()))
    }

    fn set_max_run_time(&mut self, limit: Duration) {
        lock(&self.shared).log.max_run_time = Some(limit);
    }
}

struct ScriptedStatement {
    sql: String,
    shared: Shared,
    bound: Vec<(Placeholder, RowValues)>,
    affected: u64,
    result: Option<ResultSet>,
}

#[async_trait]
impl PreparedStatement for ScriptedStatement {
    fn bind(&mut self, placeholder: &Placeholder, value: RowValues) -> Result<(), DriverError> {
        self.bound.push((placeholder.clone(), value));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), DriverError> {
        let mut script = lock(&self.shared);
        script.log.executes.push(self.sql.clone());
        if let Some(rule) = script
            .failures
            .iter_mut()
            .find(|rule| rule.remaining > 0 && self.sql.contains(&rule.fragment))
        {
            rule.remaining -= 1;
            return Err(rule.error.clone());
        }
        script.log.bound.push(self.bound.clone());

        if is_select_like(&self.sql) {
            self.affected = 0;
            self.result = Some(
                script
                    .rows
                    .iter()
                    .find(|(fragment, _)| self.sql.contains(fragment.as_str()))
                    .map(|(_, rows)| rows.clone())
                    .unwrap_or_default(),
            );
        } else {
            self.affected = script
                .affected
                .iter()
                .find(|(fragment, _)| self.sql.contains(fragment.as_str()))
                .map_or(1, |(_, n)| *n);
            script.next_insert_id += 1;
        }
        Ok(())
    }

    async fn fetch(&mut self, mode: FetchMode) -> Result<Fetched, DriverError> {
        Fetched::from_result_set(self.result.take().unwrap_or_default(), mode)
    }

    fn rows_affected(&self) -> u64 {
        self.affected
    }

    async fn close_cursor(&mut self) -> Result<(), DriverError> {
        lock(&self.shared).log.cursor_closes += 1;
        self.result = None;
        Ok(())
    }

    fn debug_dump(&self) -> String {
        format!("SQL: {} Params: {:?}", self.sql, self.bound)
    }
}
