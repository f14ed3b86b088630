use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or bound as a raw parameter.
///
/// ```rust
/// use sql_batch::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Null,
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Integer coercion used by the `count` flavor.
    ///
    /// Text is parsed leniently (leading digits only), floats truncate, booleans
    /// become 0/1; everything else counts as zero.
    #[must_use]
    pub fn coerce_int(&self) -> i64 {
        match self {
            RowValues::Int(i) => *i,
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) => *f as i64,
            RowValues::Bool(b) => i64::from(*b),
            RowValues::Text(s) => leading_int(s),
            _ => 0,
        }
    }

    /// Key form used when rows are indexed by a column value.
    #[must_use]
    pub fn key_string(&self) -> String {
        match self {
            RowValues::Int(i) => i.to_string(),
            RowValues::Float(f) => f.to_string(),
            RowValues::Text(s) => s.clone(),
            RowValues::Bool(b) => i64::from(*b).to_string(),
            RowValues::Timestamp(dt) => dt.format("%F %T%.f").to_string(),
            RowValues::Null => String::new(),
            RowValues::JSON(j) => j.to_string(),
            RowValues::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::from(s.as_str()),
            RowValues::Bool(b) => JsonValue::from(*b),
            RowValues::Timestamp(dt) => JsonValue::from(dt.format("%F %T%.f").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(j) => j.clone(),
            RowValues::Blob(b) => JsonValue::from(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

fn leading_int(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0)
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

/// How a `LIKE` binding wraps its literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeMode {
    /// `%value%`
    #[default]
    Contains,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
    /// Escaped, no wildcards added.
    Exact,
}

/// A value bound to a placeholder, optionally carrying a semantic type hint
/// that the [`Binder`](crate::binder::Binder) resolves before binding.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// Bound as-is.
    Raw(RowValues),
    /// Bound as 0/1.
    Bool(bool),
    /// Bound as a non-negative integer.
    Limit(i64),
    /// Wildcard-escaped `LIKE` literal.
    Like { pattern: String, mode: LikeMode },
    /// Bound as `YYYY-MM-DD`.
    Date(NaiveDate),
    /// Bound as `HH:MM:SS`.
    Time(NaiveTime),
    /// Bound as `YYYY-MM-DD HH:MM:SS`.
    DateTime(NaiveDateTime),
    /// Expanded into one placeholder per element for `IN (...)`.
    List(Vec<RowValues>),
}

impl BindValue {
    #[must_use]
    pub fn like(pattern: impl Into<String>, mode: LikeMode) -> Self {
        BindValue::Like {
            pattern: pattern.into(),
            mode,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            BindValue::Raw(v) => v.to_json(),
            BindValue::Bool(b) => JsonValue::from(*b),
            BindValue::Limit(n) => JsonValue::from(*n),
            BindValue::Like { pattern, .. } => JsonValue::from(pattern.as_str()),
            BindValue::Date(d) => JsonValue::from(d.format("%Y-%m-%d").to_string()),
            BindValue::Time(t) => JsonValue::from(t.format("%H:%M:%S").to_string()),
            BindValue::DateTime(dt) => {
                JsonValue::from(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            BindValue::List(items) => {
                JsonValue::Array(items.iter().map(RowValues::to_json).collect())
            }
        }
    }
}

impl From<RowValues> for BindValue {
    fn from(value: RowValues) -> Self {
        BindValue::Raw(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Raw(RowValues::Int(value))
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        BindValue::Raw(RowValues::Float(value))
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Raw(RowValues::Text(value.to_string()))
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Raw(RowValues::Text(value))
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(value)
    }
}

/// The database dialect a connection speaks.
///
/// Drives the buffered-result decision and which native error codes count as
/// lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `SQLite`
    Sqlite,
    /// `MySQL` / `MariaDB`
    Mysql,
    /// `PostgreSQL`
    Postgres,
    /// Anything else; only SQLSTATE and message patterns are consulted.
    Other,
}

impl Dialect {
    /// Whether statements must request buffered results so several can be open
    /// on one connection.
    #[must_use]
    pub fn requires_buffered(self) -> bool {
        matches!(self, Dialect::Mysql)
    }

    /// Native error codes that signal lock contention for this dialect.
    #[must_use]
    pub fn lock_codes(self) -> &'static [i64] {
        match self {
            // SQLITE_BUSY, SQLITE_LOCKED and their extended forms
            Dialect::Sqlite => &[5, 6, 261, 262, 517, 773],
            // ER_LOCK_WAIT_TIMEOUT, ER_LOCK_DEADLOCK
            Dialect::Mysql => &[1205, 1213],
            Dialect::Postgres | Dialect::Other => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_int_handles_mixed_inputs() {
        assert_eq!(RowValues::Int(7).coerce_int(), 7);
        assert_eq!(RowValues::Text("42 rows".into()).coerce_int(), 42);
        assert_eq!(RowValues::Text("-3".into()).coerce_int(), -3);
        assert_eq!(RowValues::Text("abc".into()).coerce_int(), 0);
        assert_eq!(RowValues::Float(2.9).coerce_int(), 2);
        assert_eq!(RowValues::Null.coerce_int(), 0);
    }

    #[test]
    fn bind_value_from_raw() {
        assert_eq!(BindValue::from(5_i64), BindValue::Raw(RowValues::Int(5)));
        assert_eq!(
            BindValue::from("x"),
            BindValue::Raw(RowValues::Text("x".into()))
        );
        assert_eq!(BindValue::from(true), BindValue::Bool(true));
    }

    #[test]
    fn mysql_needs_buffering() {
        assert!(Dialect::Mysql.requires_buffered());
        assert!(!Dialect::Sqlite.requires_buffered());
        assert!(Dialect::Mysql.lock_codes().contains(&1213));
    }
}
