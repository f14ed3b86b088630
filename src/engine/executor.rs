use std::time::Instant;

use crate::batch::{Batch, StatementUnit};
use crate::binder::Binder;
use crate::driver::{Connection, DriverError, PrepareOptions, PreparedStatement};
use crate::error::SqlBatchError;
use crate::flavor::Flavor;
use crate::state::{LastInsertId, ResultEnvelope};
use crate::stats::QueryStats;

/// Statement an attempt was working on when it failed.
#[derive(Debug, Clone)]
pub(crate) struct StatementContext {
    pub(crate) text: String,
    pub(crate) bindings: Option<String>,
}

impl StatementContext {
    fn of(unit: &StatementUnit) -> Self {
        let bindings = unit.bindings();
        Self {
            text: unit.text().to_string(),
            bindings: (!bindings.is_empty()).then(|| bindings.to_json_string()),
        }
    }
}

pub(crate) enum FailureCause {
    Driver(DriverError),
    /// Rejected by the binder before reaching the driver.
    Rejected(SqlBatchError),
}

/// Why one attempt stopped, plus the statement handle still needing cleanup.
pub(crate) struct AttemptFailure {
    pub(crate) context: Option<StatementContext>,
    pub(crate) statement: Option<Box<dyn PreparedStatement>>,
    pub(crate) cause: FailureCause,
}

impl AttemptFailure {
    fn transaction(err: DriverError) -> Self {
        Self {
            context: None,
            statement: None,
            cause: FailureCause::Driver(err),
        }
    }

    fn statement(
        context: StatementContext,
        statement: Option<Box<dyn PreparedStatement>>,
        err: DriverError,
    ) -> Self {
        Self {
            context: Some(context),
            statement,
            cause: FailureCause::Driver(err),
        }
    }
}

/// Everything one attempt reads and writes besides the connection.
pub(crate) struct AttemptEnv<'a> {
    pub(crate) binder: &'a dyn Binder,
    pub(crate) flavor: Flavor,
    pub(crate) stats: &'a mut QueryStats,
    pub(crate) envelope: &'a mut ResultEnvelope,
    pub(crate) debug: bool,
}

/// Run the batch once.
///
/// Without a transaction each completed statement is removed from `batch`, so
/// a later attempt resumes at the statement that failed. Inside a transaction
/// the batch is left whole and affected rows only reach the envelope after
/// commit.
pub(crate) async fn run_attempt(
    conn: &mut dyn Connection,
    batch: &mut Batch,
    env: &mut AttemptEnv<'_>,
) -> Result<(), AttemptFailure> {
    let opened = batch.uses_transaction() && !conn.in_transaction();
    if opened {
        conn.begin().await.map_err(AttemptFailure::transaction)?;
    }
    let options = PrepareOptions {
        buffered: conn.dialect().requires_buffered(),
    };

    let mut pending_affected = 0_u64;
    let mut idx = 0;
    while let Some(unit) = batch.get(idx) {
        let affected = run_unit(conn, unit, batch.is_select_like(), options, env).await?;
        if opened {
            pending_affected += affected;
            idx += 1;
        } else {
            env.envelope.last_affected += affected;
            batch.complete_front();
        }
    }

    env.envelope.last_insert_id = match conn.last_insert_id().await {
        Ok(Some(id)) => LastInsertId::Id(id),
        Ok(None) => LastInsertId::Unsupported,
        Err(err) => {
            tracing::debug!(error = %err, "driver cannot report last insert id");
            LastInsertId::Unsupported
        }
    };

    if opened && conn.in_transaction() {
        conn.commit().await.map_err(AttemptFailure::transaction)?;
    }
    env.envelope.last_affected += pending_affected;
    Ok(())
}

/// Prepare, bind, execute and drain one statement; returns its affected rows.
async fn run_unit(
    conn: &mut dyn Connection,
    unit: &StatementUnit,
    select_like: bool,
    options: PrepareOptions,
    env: &mut AttemptEnv<'_>,
) -> Result<u64, AttemptFailure> {
    let context = StatementContext::of(unit);
    let (sql, bindings) = env
        .binder
        .expand_in_placeholders(unit.text(), unit.bindings())
        .map_err(|err| AttemptFailure {
            context: Some(context.clone()),
            statement: None,
            cause: FailureCause::Rejected(err),
        })?;

    let mut stmt = match conn.prepare(&sql, options).await {
        Ok(stmt) => stmt,
        Err(err) => return Err(AttemptFailure::statement(context, None, err)),
    };
    if let Err(err) = env.binder.bind_all(stmt.as_mut(), &bindings) {
        return Err(AttemptFailure::statement(context, Some(stmt), err));
    }

    let started = Instant::now();
    if let Err(err) = stmt.execute().await {
        return Err(AttemptFailure::statement(context, Some(stmt), err));
    }
    env.stats.record(unit.text(), started.elapsed());
    if env.debug {
        tracing::debug!(target: "sql_batch::debug", dump = %stmt.debug_dump(), "statement executed");
    }

    let affected = if select_like {
        match stmt.fetch(env.flavor.fetch_mode()).await {
            Ok(fetched) => env.envelope.last_result = fetched,
            Err(err) => return Err(AttemptFailure::statement(context, Some(stmt), err)),
        }
        0
    } else {
        stmt.rows_affected()
    };

    if let Err(err) = stmt.close_cursor().await {
        tracing::debug!(error = %err, statement = %context.text, "closing cursor failed");
    }
    Ok(affected)
}
