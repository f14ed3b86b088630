//! SQLite backend over `rusqlite`, pooled with `bb8`.
//!
//! Every call into `rusqlite` runs on tokio's blocking pool while holding the
//! connection's mutex.

mod config;
mod connection;
mod params;
mod prepared;
mod query;

pub use config::{SharedSqliteConnection, SqliteManager, SqliteProvider};
pub use connection::SqliteConnection;
pub use params::row_value_to_sqlite_value;
pub use prepared::SqlitePrepared;
pub use query::{build_result_set, sqlite_extract_value_sync};

use crate::driver::DriverError;

/// Map a `rusqlite` error onto the driver-neutral form, keeping the extended
/// result code so busy and locked states can be recognised.
pub(crate) fn driver_error(err: rusqlite::Error) -> DriverError {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.unwrap_or_else(|| failure.to_string());
            DriverError::new(message).with_code(i64::from(failure.extended_code))
        }
        other => DriverError::new(other.to_string()),
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, DriverError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, DriverError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| DriverError::new(format!("sqlite spawn_blocking join error: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_keeps_extended_code() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseBusy,
                extended_code: 517,
            },
            Some("database is locked".into()),
        );
        let mapped = driver_error(err);
        assert_eq!(mapped.code, Some(517));
        assert_eq!(mapped.message, "database is locked");
    }
}
