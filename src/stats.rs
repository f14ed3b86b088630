use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

/// Cumulative execution statistics for one engine.
///
/// Timings are keyed by statement text and appended, so repeated executions of
/// the same text keep their full history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryStats {
    queries_executed: u64,
    timings: HashMap<String, Vec<Duration>>,
}

impl QueryStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution of `sql`.
    pub fn record(&mut self, sql: &str, elapsed: Duration) {
        self.queries_executed += 1;
        self.timings
            .entry(sql.to_string())
            .or_default()
            .push(elapsed);
    }

    #[must_use]
    pub fn queries_executed(&self) -> u64 {
        self.queries_executed
    }

    /// Every recorded duration for `sql`, oldest first.
    #[must_use]
    pub fn timings_for(&self, sql: &str) -> &[Duration] {
        self.timings.get(sql).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn timings(&self) -> &HashMap<String, Vec<Duration>> {
        &self.timings
    }

    /// Sum of every recorded duration.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.timings.values().flatten().sum()
    }

    /// Owned copy for reporting.
    #[must_use]
    pub fn snapshot(&self) -> QueryStats {
        self.clone()
    }

    pub fn reset(&mut self) {
        self.queries_executed = 0;
        self.timings.clear();
    }
}
