use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlBatchError;

const MIN_SECONDS: Duration = Duration::from_secs(1);

/// Engine settings that persist across calls.
///
/// Every limit has a floor of one (second or attempt); setters clamp instead of
/// failing.
/// ```rust
/// use std::time::Duration;
/// use sql_batch::prelude::*;
///
/// let cfg = EngineConfig::default().with_max_tries(0).with_sleep(Duration::ZERO);
/// assert_eq!(cfg.max_tries(), 1);
/// assert_eq!(cfg.sleep(), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    max_run_time: Duration,
    max_tries: u32,
    sleep: Duration,
    debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_run_time: Duration::from_secs(30),
            max_tries: 3,
            sleep: MIN_SECONDS,
            debug: false,
        }
    }
}

/// On-disk / environment form of [`EngineConfig`]; absent fields keep defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfigFile {
    pub max_run_time_secs: Option<u64>,
    pub max_tries: Option<u32>,
    pub sleep_secs: Option<u64>,
    pub debug: Option<bool>,
}

impl EngineConfig {
    #[must_use]
    pub fn with_max_run_time(mut self, limit: Duration) -> Self {
        self.set_max_run_time(limit);
        self
    }

    #[must_use]
    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.set_max_tries(tries);
        self
    }

    #[must_use]
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.set_sleep(sleep);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn set_max_run_time(&mut self, limit: Duration) {
        self.max_run_time = limit.max(MIN_SECONDS);
    }

    pub fn set_max_tries(&mut self, tries: u32) {
        self.max_tries = tries.max(1);
    }

    pub fn set_sleep(&mut self, sleep: Duration) {
        self.sleep = sleep.max(MIN_SECONDS);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    #[must_use]
    pub fn max_run_time(&self) -> Duration {
        self.max_run_time
    }

    #[must_use]
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    #[must_use]
    pub fn sleep(&self) -> Duration {
        self.sleep
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Overlay the fields present in `file`.
    #[must_use]
    pub fn merged(mut self, file: &EngineConfigFile) -> Self {
        if let Some(secs) = file.max_run_time_secs {
            self.set_max_run_time(Duration::from_secs(secs));
        }
        if let Some(tries) = file.max_tries {
            self.set_max_tries(tries);
        }
        if let Some(secs) = file.sleep_secs {
            self.set_sleep(Duration::from_secs(secs));
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        self
    }

    /// Parse a JSON config document on top of the defaults.
    ///
    /// # Errors
    /// Returns `SqlBatchError::ConfigError` for malformed JSON or unknown keys.
    pub fn from_json_str(json: &str) -> Result<Self, SqlBatchError> {
        let file: EngineConfigFile = serde_json::from_str(json)
            .map_err(|e| SqlBatchError::ConfigError(format!("invalid engine config: {e}")))?;
        Ok(Self::default().merged(&file))
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    /// Returns `SqlBatchError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlBatchError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SqlBatchError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `SQL_BATCH_MAX_TRIES`, `SQL_BATCH_SLEEP_SECS` and
    /// `SQL_BATCH_MAX_RUN_TIME_SECS` when set.
    ///
    /// # Errors
    /// Returns `SqlBatchError::ConfigError` when a variable is not a number.
    pub fn with_env_overrides(self) -> Result<Self, SqlBatchError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SqlBatchError> {
        let parse = |key: &str| -> Result<Option<u64>, SqlBatchError> {
            lookup(key)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| {
                        SqlBatchError::ConfigError(format!("{key}={raw} is not a number: {e}"))
                    })
                })
                .transpose()
        };
        let file = EngineConfigFile {
            max_run_time_secs: parse("SQL_BATCH_MAX_RUN_TIME_SECS")?,
            max_tries: parse("SQL_BATCH_MAX_TRIES")?
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
            sleep_secs: parse("SQL_BATCH_SLEEP_SECS")?,
            debug: None,
        };
        Ok(self.merged(&file))
    }
}
