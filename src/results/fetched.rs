use std::collections::HashMap;
use std::sync::Arc;

use super::result_set::ResultSet;
use super::row::CustomDbRow;
use crate::driver::DriverError;
use crate::flavor::FetchMode;
use crate::types::RowValues;

/// Rows of a select-like statement, shaped by the flavor's [`FetchMode`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Fetched {
    /// Nothing fetched (non-select batch, or before completion).
    #[default]
    Empty,
    /// Full rows.
    Rows(ResultSet),
    /// One column of every row.
    Column(Vec<RowValues>),
    /// First column mapped to second column, in row order; a repeated key
    /// keeps the later value in the earlier key's position.
    Pairs(Vec<(RowValues, RowValues)>),
    /// Rows keyed by their first column; a repeated key keeps the later row in
    /// the earlier row's position.
    Unique(Vec<(RowValues, CustomDbRow)>),
}

impl Fetched {
    /// Shape a buffered result set.
    ///
    /// # Errors
    /// Returns `DriverError` if the requested column does not exist, or if a
    /// pair fetch does not see exactly two columns.
    pub fn from_result_set(rs: ResultSet, mode: FetchMode) -> Result<Fetched, DriverError> {
        let width = rs.get_column_names().map_or(0, |names| names.len());
        match mode {
            FetchMode::Rows => Ok(Fetched::Rows(rs)),
            FetchMode::Column(idx) => {
                if width > 0 && idx >= width {
                    return Err(DriverError::new(format!(
                        "column index {idx} out of range for {width} columns"
                    )));
                }
                Ok(Fetched::Column(
                    rs.results
                        .into_iter()
                        .filter_map(|row| row.rows.into_iter().nth(idx))
                        .collect(),
                ))
            }
            FetchMode::KeyPair => {
                if width > 0 && width != 2 {
                    return Err(DriverError::new(format!(
                        "pair fetch requires exactly 2 columns, got {width}"
                    )));
                }
                Ok(Fetched::Pairs(last_wins(rs.results.into_iter().filter_map(
                    |row| {
                        let mut values = row.rows.into_iter();
                        Some((values.next()?, values.next()?))
                    },
                ))))
            }
            FetchMode::Unique => Ok(Fetched::Unique(unique_by_first_column(rs))),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Fetched::Empty => 0,
            Fetched::Rows(rs) => rs.len(),
            Fetched::Column(values) => values.len(),
            Fetched::Pairs(pairs) => pairs.len(),
            Fetched::Unique(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First row, when rows were fetched.
    #[must_use]
    pub fn first_row(&self) -> Option<&CustomDbRow> {
        match self {
            Fetched::Rows(rs) => rs.results.first(),
            Fetched::Unique(rows) => rows.first().map(|(_, row)| row),
            _ => None,
        }
    }

    /// First scalar: first column entry, first pair key, or first column of the
    /// first row.
    #[must_use]
    pub fn first_value(&self) -> Option<&RowValues> {
        match self {
            Fetched::Empty => None,
            Fetched::Rows(rs) => rs.results.first().and_then(|row| row.get_by_index(0)),
            Fetched::Column(values) => values.first(),
            Fetched::Pairs(pairs) => pairs.first().map(|(k, _)| k),
            Fetched::Unique(rows) => rows.first().map(|(k, _)| k),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Fetched::Empty => Value::Array(Vec::new()),
            Fetched::Rows(rs) => Value::Array(rs.results.iter().map(CustomDbRow::to_json).collect()),
            Fetched::Column(values) => Value::Array(values.iter().map(RowValues::to_json).collect()),
            Fetched::Pairs(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.key_string(), v.to_json()))
                    .collect(),
            ),
            Fetched::Unique(rows) => Value::Object(
                rows.iter()
                    .map(|(k, row)| (k.key_string(), row.to_json()))
                    .collect(),
            ),
        }
    }
}

fn unique_by_first_column(rs: ResultSet) -> Vec<(RowValues, CustomDbRow)> {
    let rest_names = Arc::new(
        rs.get_column_names()
            .map(|names| names.iter().skip(1).cloned().collect::<Vec<_>>())
            .unwrap_or_default(),
    );
    last_wins(rs.results.into_iter().filter_map(|row| {
        let mut values = row.rows.into_iter();
        let key = values.next()?;
        Some((key, CustomDbRow::new(Arc::clone(&rest_names), values.collect())))
    }))
}

/// Collapse repeated keys: the later entry replaces the earlier one in place.
fn last_wins<T>(entries: impl Iterator<Item = (RowValues, T)>) -> Vec<(RowValues, T)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<(RowValues, T)> = Vec::new();
    for (key, value) in entries {
        match positions.get(&key.key_string()) {
            Some(&pos) => out[pos] = (key, value),
            None => {
                positions.insert(key.key_string(), out.len());
                out.push((key, value));
            }
        }
    }
    out
}
