//! Failure classification and the bounded retry loop around attempts.

use std::sync::LazyLock;

use regex::Regex;

use super::executor::{self, AttemptEnv, AttemptFailure, FailureCause};
use crate::batch::Batch;
use crate::binder::Binder;
use crate::driver::{Connection, DriverError};
use crate::error::SqlBatchError;
use crate::flavor::Flavor;
use crate::state::RunState;
use crate::types::Dialect;

const SERIALIZATION_STATES: [&str; 2] = ["40001", "40P01"];

static LOCK_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)deadlock|try restarting transaction|unbuffered queries|database (?:table )?is locked",
    )
    .expect("lock message pattern is valid")
});

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Lock contention; the whole attempt can run again.
    Retryable,
    Fatal,
}

/// Classify a driver error raised while running a statement.
///
/// # Arguments
///
/// * `dialect` - Selects which native codes mean lock contention
/// * `err` - The failure as the driver reported it
///
/// # Returns
///
/// `Retryable` for serialization failures, deadlocks and lock timeouts;
/// `Fatal` for everything else
///
/// ```rust
/// use sql_batch::driver::DriverError;
/// use sql_batch::engine::{classify, Outcome};
/// use sql_batch::types::Dialect;
///
/// let err = DriverError::new("Deadlock found when trying to get lock").with_code(1213);
/// assert_eq!(classify(Dialect::Mysql, &err), Outcome::Retryable);
/// assert_eq!(classify(Dialect::Mysql, &DriverError::new("syntax error")), Outcome::Fatal);
/// ```
#[must_use]
pub fn classify(dialect: Dialect, err: &DriverError) -> Outcome {
    let by_state = err
        .sqlstate
        .as_deref()
        .is_some_and(|state| SERIALIZATION_STATES.contains(&state));
    let by_code = err
        .code
        .is_some_and(|code| dialect.lock_codes().contains(&code));
    if by_state || by_code || LOCK_MESSAGE.is_match(&err.message) {
        Outcome::Retryable
    } else {
        Outcome::Fatal
    }
}

impl AttemptFailure {
    /// Only statement failures are retried; begin/commit failures and binder
    /// rejections are final.
    fn outcome(&self, dialect: Dialect) -> Outcome {
        match (&self.context, &self.cause) {
            (Some(_), FailureCause::Driver(err)) => classify(dialect, err),
            _ => Outcome::Fatal,
        }
    }

    fn driver_message(&self) -> String {
        match &self.cause {
            FailureCause::Driver(err) => err.to_string(),
            FailureCause::Rejected(err) => err.to_string(),
        }
    }

    fn into_error(self) -> SqlBatchError {
        match (self.context, self.cause) {
            (_, FailureCause::Rejected(err)) => err,
            (Some(context), FailureCause::Driver(source)) => SqlBatchError::Execution {
                statement: context.text,
                bindings: context.bindings,
                source,
            },
            (None, FailureCause::Driver(source)) => SqlBatchError::Transaction { source },
        }
    }

    fn into_exhausted(self, max_tries: u32) -> SqlBatchError {
        match (self.context, self.cause) {
            (Some(context), FailureCause::Driver(source)) => SqlBatchError::RetriesExhausted {
                max_tries,
                statement: context.text,
                source,
            },
            (context, cause) => AttemptFailure {
                context,
                statement: None,
                cause,
            }
            .into_error(),
        }
    }
}

/// Run attempts until one succeeds, a failure is fatal, or the try budget is
/// spent.
///
/// A transaction the caller opened before the call is never rolled back here,
/// and failures inside it are not retried.
pub(crate) async fn run(
    state: &mut RunState,
    binder: &dyn Binder,
    batch: &mut Batch,
    flavor: Flavor,
) -> Result<(), SqlBatchError> {
    let RunState {
        connection,
        config,
        stats,
        envelope,
    } = state;
    let conn = connection
        .as_deref_mut()
        .ok_or_else(|| SqlBatchError::ConnectionError("no connection available".into()))?;
    let max_tries = config.max_tries();
    let caller_transaction = conn.in_transaction();

    let mut env = AttemptEnv {
        binder,
        flavor,
        stats,
        envelope,
        debug: config.debug(),
    };

    let mut attempt = 1;
    loop {
        let mut failure = match executor::run_attempt(conn, batch, &mut env).await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };
        let outcome = if caller_transaction {
            Outcome::Fatal
        } else {
            failure.outcome(conn.dialect())
        };
        clean_up(conn, &mut failure, caller_transaction, env.debug).await;

        match outcome {
            Outcome::Fatal => return Err(failure.into_error()),
            Outcome::Retryable if attempt >= max_tries => {
                tracing::warn!(attempt, max_tries, "lock contention persisted; giving up");
                return Err(failure.into_exhausted(max_tries));
            }
            Outcome::Retryable => {
                tracing::warn!(
                    attempt,
                    max_tries,
                    remaining = batch.len(),
                    error = %failure.driver_message(),
                    "lock contention detected; retrying batch"
                );
                tokio::time::sleep(config.sleep()).await;
                attempt += 1;
            }
        }
    }
}

/// Close the failed statement's cursor and undo our own transaction.
async fn clean_up(
    conn: &mut dyn Connection,
    failure: &mut AttemptFailure,
    caller_transaction: bool,
    debug: bool,
) {
    if let Some(mut stmt) = failure.statement.take() {
        if debug {
            tracing::debug!(target: "sql_batch::debug", dump = %stmt.debug_dump(), "statement failed");
        }
        if let Err(err) = stmt.close_cursor().await {
            tracing::debug!(error = %err, "closing cursor after failure failed");
        }
    }
    if !caller_transaction
        && conn.in_transaction()
        && let Err(err) = conn.rollback().await
    {
        tracing::warn!(error = %err, "rollback after failed attempt failed");
    }
}
