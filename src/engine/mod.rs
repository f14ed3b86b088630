//! The batch engine: preprocessing, attempts with retry, and result shaping.

mod executor;
mod retry;
mod shape;

use std::sync::Arc;
use std::time::Duration;

pub use retry::{Outcome, classify};
pub use shape::QueryOutput;

use crate::batch::{Batch, BatchInput};
use crate::binder::{Binder, Bindings, StandardBinder};
use crate::config::EngineConfig;
use crate::driver::{Connection, ConnectionProvider};
use crate::error::SqlBatchError;
use crate::flavor::Flavor;
use crate::state::{ResultEnvelope, RunState};
use crate::stats::QueryStats;

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Dump each statement's bound parameters after it runs or fails.
    pub debug: bool,
}

impl QueryOptions {
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Runs statement batches against one connection.
///
/// The engine holds the connection it was given (or acquired from its
/// provider) across calls and never closes it; use
/// [`take_connection`](Self::take_connection) to get it back.
pub struct BatchEngine {
    state: RunState,
    provider: Option<Arc<dyn ConnectionProvider>>,
    binder: Arc<dyn Binder>,
}

impl Default for BatchEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("state", &self.state)
            .field("has_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

impl BatchEngine {
    /// Create an engine with no connection yet
    ///
    /// # Arguments
    ///
    /// * `config` - Retry, sleep and run-time limits kept across calls
    ///
    /// # Returns
    ///
    /// A new `BatchEngine` using the standard binder
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: RunState::new(config),
            provider: None,
            binder: Arc::new(StandardBinder),
        }
    }

    /// Attach the connection every call runs on
    ///
    /// # Arguments
    ///
    /// * `connection` - A live connection; the engine never closes it
    #[must_use]
    pub fn with_connection(mut self, connection: Box<dyn Connection>) -> Self {
        self.state.connection = Some(connection);
        self
    }

    /// Connections are acquired from `provider` whenever none is set.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn set_connection(&mut self, connection: Box<dyn Connection>) {
        self.state.connection = Some(connection);
    }

    /// Hand the current connection back to the caller.
    pub fn take_connection(&mut self) -> Option<Box<dyn Connection>> {
        self.state.connection.take()
    }

    pub fn set_max_run_time(&mut self, limit: Duration) {
        self.state.config.set_max_run_time(limit);
    }

    pub fn set_max_tries(&mut self, tries: u32) {
        self.state.config.set_max_tries(tries);
    }

    pub fn set_sleep(&mut self, sleep: Duration) {
        self.state.config.set_sleep(sleep);
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.state.config()
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    #[must_use]
    pub fn stats(&self) -> &QueryStats {
        self.state.stats()
    }

    pub fn reset_stats(&mut self) {
        self.state.stats.reset();
    }

    /// What the last call left behind: fetched rows, affected rows, insert id.
    #[must_use]
    pub fn envelope(&self) -> &ResultEnvelope {
        self.state.envelope()
    }

    /// Run `statements` and shape the outcome by `flavor`.
    ///
    /// # Arguments
    ///
    /// * `statements` - One string to split on `;`, a list of statements, or
    ///   statements paired with their own bindings
    /// * `bindings` - Applied to every statement; a statement's own bindings
    ///   win on conflicting placeholders
    /// * `flavor` - How the result is shaped
    ///
    /// # Returns
    ///
    /// The shaped output. The full envelope stays readable through
    /// [`envelope`](Self::envelope) until the next call passes validation.
    ///
    /// # Errors
    /// Returns `SqlBatchError::Validation` before touching the database when
    /// the batch is malformed or `flavor` does not fit it, and
    /// `Execution`/`Transaction`/`RetriesExhausted` for database failures.
    pub async fn query(
        &mut self,
        statements: impl Into<BatchInput>,
        bindings: &Bindings,
        flavor: Flavor,
    ) -> Result<QueryOutput, SqlBatchError> {
        self.query_with(statements, bindings, flavor, QueryOptions::default())
            .await
    }

    /// [`query`](Self::query) with per-call options.
    ///
    /// # Arguments
    ///
    /// * `options` - Applies to this call only; `debug` is off again for the
    ///   next plain [`query`](Self::query)
    ///
    /// # Errors
    /// Same as [`query`](Self::query).
    pub async fn query_with(
        &mut self,
        statements: impl Into<BatchInput>,
        bindings: &Bindings,
        flavor: Flavor,
        options: QueryOptions,
    ) -> Result<QueryOutput, SqlBatchError> {
        self.state.config.set_debug(options.debug);
        let mut batch = Batch::prepare(statements.into(), bindings, flavor)?;
        self.state.envelope.reset();

        self.ensure_connection().await?;
        if let Some(conn) = self.state.connection.as_deref_mut() {
            conn.set_max_run_time(self.state.config.max_run_time());
        }

        let binder = Arc::clone(&self.binder);
        retry::run(&mut self.state, binder.as_ref(), &mut batch, flavor).await?;
        Ok(shape::shape(flavor, &self.state.envelope))
    }

    async fn ensure_connection(&mut self) -> Result<(), SqlBatchError> {
        if self.state.connection.is_some() {
            return Ok(());
        }
        let Some(provider) = &self.provider else {
            return Err(SqlBatchError::ConnectionError(
                "no connection set and no provider configured".into(),
            ));
        };
        let connection = provider.acquire().await?;
        tracing::debug!(dialect = ?connection.dialect(), "acquired connection from provider");
        self.state.connection = Some(connection);
        Ok(())
    }
}
