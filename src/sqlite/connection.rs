use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::PooledConnection;
use tokio::sync::Mutex;

use super::config::{SharedSqliteConnection, SqliteManager};
use super::prepared::SqlitePrepared;
use super::{driver_error, run_blocking};
use crate::driver::{Connection, DriverError, PrepareOptions, PreparedStatement};
use crate::error::SqlBatchError;
use crate::types::Dialect;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// A `SQLite` connection, either owned outright or checked out of a pool.
pub struct SqliteConnection {
    handle: SharedSqliteConnection,
    /// Keeps a pooled connection checked out until this wrapper drops.
    _lease: Option<PooledConnection<'static, SqliteManager>>,
    in_transaction: bool,
    busy_timeout: Duration,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self::from_shared(Arc::new(Mutex::new(conn)))
    }

    #[must_use]
    pub fn from_shared(handle: SharedSqliteConnection) -> Self {
        Self {
            handle,
            _lease: None,
            in_transaction: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub(crate) fn from_pooled(conn: PooledConnection<'static, SqliteManager>) -> Self {
        Self {
            handle: Arc::clone(&*conn),
            _lease: Some(conn),
            in_transaction: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Open (creating if needed) the database file at `path`.
    ///
    /// # Errors
    /// Returns `SqlBatchError::ConnectionError` if the file cannot be opened.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SqlBatchError> {
        let path = path.into();
        let conn = tokio::task::spawn_blocking(move || rusqlite::Connection::open(&path))
            .await
            .map_err(|e| SqlBatchError::ConnectionError(format!("sqlite open join error: {e}")))?
            .map_err(|e| SqlBatchError::ConnectionError(format!("sqlite open error: {e}")))?;
        Ok(Self::new(conn))
    }

    /// # Errors
    /// Returns `SqlBatchError::ConnectionError` if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, SqlBatchError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| SqlBatchError::ConnectionError(format!("sqlite open error: {e}")))?;
        Ok(Self::new(conn))
    }

    /// Shared handle to the underlying `rusqlite` connection.
    #[must_use]
    pub fn handle(&self) -> SharedSqliteConnection {
        Arc::clone(&self.handle)
    }

    async fn run_sql(&self, sql: &'static str) -> Result<(), DriverError> {
        run_blocking(self.handle(), move |guard| {
            guard.execute_batch(sql).map_err(driver_error)
        })
        .await
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("pooled", &self._lease.is_some())
            .field("in_transaction", &self.in_transaction)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn prepare(
        &mut self,
        sql: &str,
        _options: PrepareOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError> {
        let sql = Arc::new(sql.to_string());
        let query = Arc::clone(&sql);
        let busy_timeout = self.busy_timeout;
        let (parameters, returns_rows) = run_blocking(self.handle(), move |guard| {
            guard.busy_timeout(busy_timeout).map_err(driver_error)?;
            let stmt = guard.prepare_cached(&query).map_err(driver_error)?;
            let parameters = (1..=stmt.parameter_count())
                .map(|idx| stmt.parameter_name(idx).map(str::to_string))
                .collect::<Vec<_>>();
            Ok((parameters, stmt.column_count() > 0))
        })
        .await?;
        Ok(Box::new(SqlitePrepared::new(
            self.handle(),
            sql,
            parameters,
            returns_rows,
        )))
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.run_sql("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.run_sql("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.in_transaction = false;
        self.run_sql("ROLLBACK").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn last_insert_id(&mut self) -> Result<Option<String>, DriverError> {
        run_blocking(self.handle(), |guard| {
            Ok(Some(guard.last_insert_rowid().to_string()))
        })
        .await
    }

    /// Applied as the busy timeout of every later statement.
    fn set_max_run_time(&mut self, limit: Duration) {
        self.busy_timeout = limit;
    }
}
