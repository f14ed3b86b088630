//! Batch SQL execution with automatic transaction wrapping, lock-contention
//! retry, and flavor-shaped results.
//!
//! A call hands the engine one or more statements, shared bindings, and a
//! [`Flavor`](flavor::Flavor) describing what should come back:
//!
//! ```rust,no_run
//! use sql_batch::prelude::*;
//!
//! # async fn run() -> Result<(), SqlBatchError> {
//! let conn = SqliteConnection::open("app.db").await?;
//! let mut engine = BatchEngine::new(EngineConfig::default()).with_connection(Box::new(conn));
//!
//! engine
//!     .execute(
//!         "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, name TEXT);
//!          INSERT INTO t (name) VALUES ('a');",
//!         &Bindings::new(),
//!     )
//!     .await?;
//! let n = engine
//!     .count("SELECT COUNT(*) FROM t WHERE name = :name", &Bindings::new().named("name", "a"))
//!     .await?;
//! assert_eq!(n, 1);
//! # Ok(())
//! # }
//! ```
//!
//! Multi-statement batches run inside one transaction and are retried from
//! the top on deadlock; a single select runs without a transaction. See
//! [`engine::BatchEngine::query`] for the full contract.

pub mod batch;
pub mod binder;
pub mod classify;
pub mod config;
mod convenience;
pub mod driver;
pub mod engine;
pub mod error;
pub mod flavor;
pub mod prelude;
pub mod results;
pub mod split;
pub mod state;
pub mod stats;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::{BatchEngine, QueryOptions, QueryOutput};
pub use error::SqlBatchError;
