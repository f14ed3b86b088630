//! Placeholder bindings and the collaborator that applies them to statements.

use std::collections::BTreeMap;
use std::fmt;

use crate::driver::{DriverError, PreparedStatement};
use crate::error::SqlBatchError;
use crate::types::{BindValue, LikeMode, RowValues};

/// A statement placeholder: `:name` or the 1-based `?N`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    Named(String),
    Positional(usize),
}

impl Placeholder {
    /// Named placeholder; a leading `:` is accepted and stripped.
    #[must_use]
    pub fn named(name: impl AsRef<str>) -> Self {
        Placeholder::Named(name.as_ref().trim_start_matches(':').to_string())
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Named(name) => write!(f, ":{name}"),
            Placeholder::Positional(idx) => write!(f, "?{idx}"),
        }
    }
}

/// Ordered mapping of placeholders to values.
///
/// ```rust
/// use sql_batch::prelude::*;
///
/// let bindings = Bindings::new()
///     .named("id", 7_i64)
///     .named("active", true)
///     .positional(1, "x");
/// assert_eq!(bindings.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(BTreeMap<Placeholder, BindValue>);

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn named(mut self, name: impl AsRef<str>, value: impl Into<BindValue>) -> Self {
        self.0.insert(Placeholder::named(name), value.into());
        self
    }

    #[must_use]
    pub fn positional(mut self, index: usize, value: impl Into<BindValue>) -> Self {
        self.0.insert(Placeholder::Positional(index), value.into());
        self
    }

    /// Bind every value positionally, starting at `?1`.
    #[must_use]
    pub fn from_positional(values: impl IntoIterator<Item = RowValues>) -> Self {
        Self(
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Placeholder::Positional(i + 1), BindValue::Raw(v)))
                .collect(),
        )
    }

    pub fn insert(&mut self, placeholder: Placeholder, value: BindValue) {
        self.0.insert(placeholder, value);
    }

    #[must_use]
    pub fn get(&self, placeholder: &Placeholder) -> Option<&BindValue> {
        self.0.get(placeholder)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Placeholder, &BindValue)> {
        self.0.iter()
    }

    /// Union with `globals`; entries already present here win.
    #[must_use]
    pub fn merged_over(mut self, globals: &Bindings) -> Self {
        for (key, value) in &globals.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }

    /// Compact JSON rendering used in error messages and debug dumps.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        let map = self
            .0
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map).to_string()
    }
}

impl<P: Into<Placeholder>, V: Into<BindValue>> FromIterator<(P, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (P, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, v)| (p.into(), v.into())).collect())
    }
}

impl From<&str> for Placeholder {
    fn from(value: &str) -> Self {
        Placeholder::named(value)
    }
}

impl From<usize> for Placeholder {
    fn from(value: usize) -> Self {
        Placeholder::Positional(value)
    }
}

/// Turns semantic bindings into driver values and applies them to statements.
pub trait Binder: Send + Sync {
    /// Rewrite `IN (:list)` placeholders so each list element gets its own
    /// placeholder, returning the new text and bindings.
    ///
    /// # Errors
    /// Returns `SqlBatchError::Validation` when a list cannot be expanded.
    fn expand_in_placeholders(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> Result<(String, Bindings), SqlBatchError>;

    /// Bind every value onto a prepared statement.
    ///
    /// # Errors
    /// Returns `DriverError` when the statement rejects a binding.
    fn bind_all(
        &self,
        stmt: &mut dyn PreparedStatement,
        bindings: &Bindings,
    ) -> Result<(), DriverError>;
}

/// Default binder: coerces type hints and expands named `IN` lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBinder;

impl StandardBinder {
    /// Resolve a semantic binding into the value the driver sees.
    ///
    /// `LIKE` literals escape `\`, `%` and `_` with a backslash; pair the
    /// placeholder with `ESCAPE '\'` on engines without a default escape.
    ///
    /// # Errors
    /// Returns `DriverError` for lists, which must be expanded first.
    pub fn resolve(value: &BindValue) -> Result<RowValues, DriverError> {
        Ok(match value {
            BindValue::Raw(v) => v.clone(),
            BindValue::Bool(b) => RowValues::Int(i64::from(*b)),
            BindValue::Limit(n) => RowValues::Int((*n).max(0)),
            BindValue::Like { pattern, mode } => RowValues::Text(like_literal(pattern, *mode)),
            BindValue::Date(d) => RowValues::Text(d.format("%Y-%m-%d").to_string()),
            BindValue::Time(t) => RowValues::Text(t.format("%H:%M:%S").to_string()),
            BindValue::DateTime(dt) => RowValues::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            BindValue::List(_) => {
                return Err(DriverError::new(
                    "list binding reached the driver without IN expansion",
                ));
            }
        })
    }
}

impl Binder for StandardBinder {
    fn expand_in_placeholders(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> Result<(String, Bindings), SqlBatchError> {
        let mut text = sql.to_string();
        let mut expanded = Bindings::new();
        for (placeholder, value) in bindings.iter() {
            let BindValue::List(items) = value else {
                expanded.insert(placeholder.clone(), value.clone());
                continue;
            };
            let Placeholder::Named(name) = placeholder else {
                return Err(SqlBatchError::validation(format!(
                    "list binding for {placeholder} needs a named placeholder"
                )));
            };
            let replacement = if items.is_empty() {
                "NULL".to_string()
            } else {
                (0..items.len())
                    .map(|i| format!(":{name}__{i}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            text = replace_named(&text, name, &replacement);
            for (i, item) in items.iter().enumerate() {
                expanded.insert(
                    Placeholder::Named(format!("{name}__{i}")),
                    BindValue::Raw(item.clone()),
                );
            }
        }
        Ok((text, expanded))
    }

    fn bind_all(
        &self,
        stmt: &mut dyn PreparedStatement,
        bindings: &Bindings,
    ) -> Result<(), DriverError> {
        for (placeholder, value) in bindings.iter() {
            stmt.bind(placeholder, Self::resolve(value)?)?;
        }
        Ok(())
    }
}

fn like_literal(pattern: &str, mode: LikeMode) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    match mode {
        LikeMode::Contains => format!("%{escaped}%"),
        LikeMode::StartsWith => format!("{escaped}%"),
        LikeMode::EndsWith => format!("%{escaped}"),
        LikeMode::Exact => escaped,
    }
}

/// Replace `:name` tokens outside quoted literals.
fn replace_named(sql: &str, name: &str, replacement: &str) -> String {
    let token = format!(":{name}");
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + replacement.len());
    let mut quote: Option<u8> = None;
    let mut last = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    idx += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if bytes[idx..].starts_with(token.as_bytes())
                    && (idx == 0 || bytes[idx - 1] != b':')
                    && !bytes
                        .get(idx + token.len())
                        .is_some_and(|n| n.is_ascii_alphanumeric() || *n == b'_')
                {
                    out.push_str(&sql[last..idx]);
                    out.push_str(replacement);
                    idx += token.len();
                    last = idx;
                    continue;
                }
            }
        }
        idx += 1;
    }
    out.push_str(&sql[last..]);
    out
}
