use std::fmt;

use crate::config::EngineConfig;
use crate::driver::Connection;
use crate::results::Fetched;
use crate::stats::QueryStats;

/// Last-insert id as seen after a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LastInsertId {
    /// The call has not completed (or nothing ran yet).
    #[default]
    Unset,
    /// The driver cannot report one; this is not an error.
    Unsupported,
    Id(String),
}

impl LastInsertId {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LastInsertId::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Numeric form, when the id parses as an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_str().and_then(|id| id.parse().ok())
    }

    /// JSON rendering: the id, `false` when unsupported, `null` when unset.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            LastInsertId::Unset => serde_json::Value::Null,
            LastInsertId::Unsupported => serde_json::Value::Bool(false),
            LastInsertId::Id(id) => serde_json::Value::from(id.as_str()),
        }
    }
}

/// What the last call left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultEnvelope {
    pub last_result: Fetched,
    /// Sum of affected rows across the batch.
    pub last_affected: u64,
    pub last_insert_id: LastInsertId,
}

impl ResultEnvelope {
    pub(crate) fn reset(&mut self) {
        *self = ResultEnvelope::default();
    }
}

/// Everything one engine instance carries between calls.
#[derive(Default)]
pub struct RunState {
    pub(crate) connection: Option<Box<dyn Connection>>,
    pub(crate) config: EngineConfig,
    pub(crate) stats: QueryStats,
    pub(crate) envelope: ResultEnvelope,
}

impl RunState {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            connection: None,
            config,
            stats: QueryStats::default(),
            envelope: ResultEnvelope::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    #[must_use]
    pub fn envelope(&self) -> &ResultEnvelope {
        &self.envelope
    }

    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field(
                "connection",
                &self.connection.as_ref().map(|conn| conn.dialect()),
            )
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("envelope", &self.envelope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_id_json_forms() {
        assert_eq!(LastInsertId::Unsupported.to_json(), serde_json::json!(false));
        assert_eq!(LastInsertId::Unset.to_json(), serde_json::Value::Null);
        assert_eq!(LastInsertId::Id("12".into()).as_i64(), Some(12));
    }

    #[test]
    fn envelope_reset_clears_everything() {
        let mut env = ResultEnvelope {
            last_result: Fetched::Column(vec![crate::types::RowValues::Int(1)]),
            last_affected: 4,
            last_insert_id: LastInsertId::Id("9".into()),
        };
        env.reset();
        assert_eq!(env, ResultEnvelope::default());
    }
}
