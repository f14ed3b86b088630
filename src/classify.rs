//! Statement classification by leading keyword and trailing clause.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SqlBatchError;

static SELECT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\A\s*(?:\(\s*)*(?:WITH|SELECT|SHOW|HANDLER|ANALYZE|CHECK|DESCRIBE|DESC|EXPLAIN|HELP)\b",
    )
    .expect("select-like pattern is valid")
});

static INSERT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\A\s*INSERT\s+INTO\b").expect("insert pattern is valid"));

static COMMENT_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A(?:\s*(?:--[^\n]*|#[^\n]*|/\*.*?\*/))+\s*\z")
        .expect("comment pattern is valid")
});

static TRAILING_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    let arg = r"(?:\d+|\?\d*|:\w+)";
    Regex::new(&format!(
        r"(?is)\bLIMIT\s+{arg}(?:\s*,\s*{arg}|\s+OFFSET\s+{arg})?\s*;?\s*\z"
    ))
    .expect("limit pattern is valid")
});

/// True when the statement is expected to return rows: `SELECT` and its
/// siblings, or a `WITH` common-table expression.
///
/// ```rust
/// use sql_batch::classify::is_select_like;
///
/// assert!(is_select_like("WITH t AS (SELECT 1) SELECT * FROM t"));
/// assert!(!is_select_like("INSERT INTO t VALUES (1)"));
/// ```
#[must_use]
pub fn is_select_like(sql: &str) -> bool {
    SELECT_LIKE.is_match(sql)
}

/// Strict form of [`is_select_like`].
///
/// # Errors
/// Returns `SqlBatchError::Validation` when the statement is not select-like.
pub fn require_select_like(sql: &str) -> Result<(), SqlBatchError> {
    if is_select_like(sql) {
        Ok(())
    } else {
        Err(SqlBatchError::validation(format!(
            "statement is not select-like: {sql}"
        )))
    }
}

/// True when the statement begins with `INSERT INTO`.
#[must_use]
pub fn is_insert(sql: &str) -> bool {
    INSERT.is_match(sql)
}

/// Strict form of [`is_insert`].
///
/// # Errors
/// Returns `SqlBatchError::Validation` when the statement is not an insert.
pub fn require_insert(sql: &str) -> Result<(), SqlBatchError> {
    if is_insert(sql) {
        Ok(())
    } else {
        Err(SqlBatchError::validation(format!(
            "statement is not an INSERT: {sql}"
        )))
    }
}

/// True when the text holds nothing but `--`, `#` or `/* */` comments.
#[must_use]
pub fn is_comment_only(sql: &str) -> bool {
    COMMENT_ONLY.is_match(sql)
}

/// True when the statement already ends in a `LIMIT` clause.
#[must_use]
pub fn has_limit_clause(sql: &str) -> bool {
    TRAILING_LIMIT.is_match(sql)
}

/// Append `LIMIT 0,1`, keeping a trailing terminator in place.
#[must_use]
pub fn with_single_row_limit(sql: &str) -> String {
    let trimmed = sql.trim_end();
    match trimmed.strip_suffix(';') {
        Some(body) => format!("{} LIMIT 0,1;", body.trim_end()),
        None => format!("{trimmed} LIMIT 0,1"),
    }
}
