use serde_json::Value as JsonValue;

use super::StatementUnit;
use crate::binder::{Bindings, Placeholder};
use crate::error::SqlBatchError;
use crate::types::{BindValue, RowValues};

/// Every shape a caller may hand to [`query`](crate::engine::BatchEngine::query).
///
/// Conversions exist for the common forms, so call sites rarely name this type:
/// ```rust
/// use sql_batch::prelude::*;
///
/// let _: BatchInput = "INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)".into();
/// let _: BatchInput = vec!["DELETE FROM t", "DELETE FROM u"].into();
/// let _: BatchInput = vec![("DELETE FROM t WHERE id = :id", Bindings::new().named("id", 1_i64))].into();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInput {
    /// One string, split on top-level semicolons.
    Text(String),
    /// Already separated statements.
    Statements(Vec<String>),
    /// Statements with their own bindings.
    Pairs(Vec<(String, Bindings)>),
    /// Prebuilt units.
    Units(Vec<StatementUnit>),
}

impl BatchInput {
    /// Build from a JSON document: a string, or an array whose elements are
    /// strings, `[text, {bindings}]` pairs, or `{"text": .., "bindings": {..}}`
    /// records.
    ///
    /// # Errors
    /// Returns `SqlBatchError::Validation` for any other shape or a non-text
    /// statement.
    pub fn from_json(value: &JsonValue) -> Result<Self, SqlBatchError> {
        match value {
            JsonValue::String(text) => Ok(BatchInput::Text(text.clone())),
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| json_pair(idx, item))
                .collect::<Result<Vec<_>, _>>()
                .map(BatchInput::Pairs),
            other => Err(SqlBatchError::validation(format!(
                "batch must be a string or an array, got {other}"
            ))),
        }
    }
}

fn json_pair(idx: usize, item: &JsonValue) -> Result<(String, Bindings), SqlBatchError> {
    let (text, bindings) = match item {
        JsonValue::String(text) => (Some(text), None),
        JsonValue::Array(parts) if (1..=2).contains(&parts.len()) => {
            (as_string(&parts[0]), parts.get(1))
        }
        JsonValue::Object(map) => (
            map.get("text").and_then(as_string),
            map.get("bindings"),
        ),
        _ => (None, None),
    };
    let text = text.ok_or_else(|| {
        SqlBatchError::validation(format!("statement {idx} is not text: {item}"))
    })?;
    let bindings = match bindings {
        None | Some(JsonValue::Null) => Bindings::new(),
        Some(value) => bindings_from_json(value)?,
    };
    Ok((text.clone(), bindings))
}

fn as_string(value: &JsonValue) -> Option<&String> {
    match value {
        JsonValue::String(s) => Some(s),
        _ => None,
    }
}

/// Bindings from a JSON object; numeric keys are positional, others named.
///
/// # Errors
/// Returns `SqlBatchError::Validation` if `value` is not an object.
pub fn bindings_from_json(value: &JsonValue) -> Result<Bindings, SqlBatchError> {
    let JsonValue::Object(map) = value else {
        return Err(SqlBatchError::validation(format!(
            "bindings must be an object, got {value}"
        )));
    };
    let mut bindings = Bindings::new();
    for (key, value) in map {
        let trimmed = key.trim_start_matches('?');
        let placeholder = match trimmed.parse::<usize>() {
            Ok(idx) => Placeholder::Positional(idx),
            Err(_) => Placeholder::named(key),
        };
        let bound = match value {
            JsonValue::Array(items) => BindValue::List(items.iter().map(json_value).collect()),
            JsonValue::Bool(b) => BindValue::Bool(*b),
            other => BindValue::Raw(json_value(other)),
        };
        bindings.insert(placeholder, bound);
    }
    Ok(bindings)
}

fn json_value(value: &JsonValue) -> RowValues {
    match value {
        JsonValue::Null => RowValues::Null,
        JsonValue::Bool(b) => RowValues::Bool(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map_or_else(|| RowValues::Float(n.as_f64().unwrap_or(0.0)), RowValues::Int),
        JsonValue::String(s) => RowValues::Text(s.clone()),
        other => RowValues::JSON(other.clone()),
    }
}

impl From<&str> for BatchInput {
    fn from(value: &str) -> Self {
        BatchInput::Text(value.to_string())
    }
}

impl From<String> for BatchInput {
    fn from(value: String) -> Self {
        BatchInput::Text(value)
    }
}

impl From<Vec<String>> for BatchInput {
    fn from(value: Vec<String>) -> Self {
        BatchInput::Statements(value)
    }
}

impl From<Vec<&str>> for BatchInput {
    fn from(value: Vec<&str>) -> Self {
        BatchInput::Statements(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for BatchInput {
    fn from(value: [&str; N]) -> Self {
        BatchInput::Statements(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<(String, Bindings)>> for BatchInput {
    fn from(value: Vec<(String, Bindings)>) -> Self {
        BatchInput::Pairs(value)
    }
}

impl From<Vec<(&str, Bindings)>> for BatchInput {
    fn from(value: Vec<(&str, Bindings)>) -> Self {
        BatchInput::Pairs(
            value
                .into_iter()
                .map(|(text, bindings)| (text.to_string(), bindings))
                .collect(),
        )
    }
}

impl From<Vec<StatementUnit>> for BatchInput {
    fn from(value: Vec<StatementUnit>) -> Self {
        BatchInput::Units(value)
    }
}

impl From<StatementUnit> for BatchInput {
    fn from(value: StatementUnit) -> Self {
        BatchInput::Units(vec![value])
    }
}
