use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum SqlBatchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("SQL execution error: {source}; statement: {statement}{}", bindings_suffix(.bindings))]
    Execution {
        statement: String,
        bindings: Option<String>,
        #[source]
        source: DriverError,
    },

    #[error("Failed to start or end transaction: {source}")]
    Transaction {
        #[source]
        source: DriverError,
    },

    #[error("Deadlock persisted after {max_tries} tries; statement: {statement}")]
    RetriesExhausted {
        max_tries: u32,
        statement: String,
        #[source]
        source: DriverError,
    },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl SqlBatchError {
    /// Shorthand for a `Validation` error.
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SqlBatchError::Validation(msg.into())
    }

    /// True for errors raised before any database interaction.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, SqlBatchError::Validation(_))
    }

    /// The underlying driver error, when the failure came from the database.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            SqlBatchError::Execution { source, .. }
            | SqlBatchError::Transaction { source }
            | SqlBatchError::RetriesExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn bindings_suffix(bindings: &Option<String>) -> String {
    match bindings {
        Some(json) => format!("; bindings: {json}"),
        None => String::new(),
    }
}
