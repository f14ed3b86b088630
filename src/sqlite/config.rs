use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use tokio::sync::Mutex;

use super::connection::SqliteConnection;
use super::{driver_error, run_blocking};
use crate::driver::{Connection, ConnectionProvider, DriverError};
use crate::error::SqlBatchError;

/// A `rusqlite` connection shared between async callers and blocking workers.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// bb8 manager for `SQLite` connections to one database file.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: PathBuf,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlBatchError::ConnectionError` if creating the pool fails.
    pub async fn build_pool(self) -> Result<Pool<SqliteManager>, SqlBatchError> {
        Pool::builder()
            .build(self)
            .await
            .map_err(|e| SqlBatchError::ConnectionError(format!("sqlite pool error: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = DriverError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&path).map_err(driver_error)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")
                    .map_err(driver_error)?;
                Ok::<_, DriverError>(conn)
            })
            .await
            .map_err(|e| DriverError::new(format!("sqlite spawn_blocking join error: {e}")))??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard.execute_batch("SELECT 1").map_err(driver_error)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pool-backed [`ConnectionProvider`] for `SQLite`.
#[derive(Clone)]
pub struct SqliteProvider {
    pool: Pool<SqliteManager>,
}

impl SqliteProvider {
    /// Open a pool over the database at `path`.
    ///
    /// # Errors
    /// Returns `SqlBatchError::ConnectionError` if the pool cannot be built.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SqlBatchError> {
        let pool = SqliteManager::new(path).build_pool().await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: Pool<SqliteManager>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for SqliteProvider {
    async fn acquire(&self) -> Result<Box<dyn Connection>, SqlBatchError> {
        let conn = self.pool.get_owned().await.map_err(|e| {
            SqlBatchError::ConnectionError(format!("sqlite checkout error: {e}"))
        })?;
        Ok(Box::new(SqliteConnection::from_pooled(conn)))
    }
}
