use crate::flavor::Flavor;
use crate::results::{CustomDbRow, Fetched, ResultSet};
use crate::state::{LastInsertId, ResultEnvelope};
use crate::types::RowValues;

/// The value a call returns, one variant per [`Flavor`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// The batch completed.
    Bool(bool),
    InsertId(LastInsertId),
    Affected(u64),
    Rows(ResultSet),
    Column(Vec<RowValues>),
    Pairs(Vec<(RowValues, RowValues)>),
    Unique(Vec<(RowValues, CustomDbRow)>),
    /// First row, or `None` when the select matched nothing.
    Row(Option<CustomDbRow>),
    Value(Option<RowValues>),
    Count(i64),
    Check(bool),
}

impl QueryOutput {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryOutput::Bool(b) | QueryOutput::Check(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_affected(&self) -> Option<u64> {
        match self {
            QueryOutput::Affected(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_count(&self) -> Option<i64> {
        match self {
            QueryOutput::Count(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            QueryOutput::Rows(rs) => Some(rs),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            QueryOutput::Bool(b) | QueryOutput::Check(b) => Value::Bool(*b),
            QueryOutput::InsertId(id) => id.to_json(),
            QueryOutput::Affected(n) => Value::from(*n),
            QueryOutput::Count(n) => Value::from(*n),
            QueryOutput::Rows(rs) => Fetched::Rows(rs.clone()).to_json(),
            QueryOutput::Column(values) => Value::Array(values.iter().map(RowValues::to_json).collect()),
            QueryOutput::Pairs(pairs) => Fetched::Pairs(pairs.clone()).to_json(),
            QueryOutput::Unique(rows) => Fetched::Unique(rows.clone()).to_json(),
            QueryOutput::Row(row) => row
                .as_ref()
                .map_or_else(|| Value::Object(serde_json::Map::new()), CustomDbRow::to_json),
            QueryOutput::Value(value) => value.as_ref().map_or(Value::Null, RowValues::to_json),
        }
    }
}

/// Project the envelope of a successful call onto `flavor`.
pub(crate) fn shape(flavor: Flavor, envelope: &ResultEnvelope) -> QueryOutput {
    let fetched = &envelope.last_result;
    match flavor {
        Flavor::Bool => QueryOutput::Bool(true),
        Flavor::Increment => QueryOutput::InsertId(envelope.last_insert_id.clone()),
        Flavor::Affected => QueryOutput::Affected(envelope.last_affected),
        Flavor::All => QueryOutput::Rows(match fetched {
            Fetched::Rows(rs) => rs.clone(),
            _ => ResultSet::default(),
        }),
        Flavor::Column(_) => QueryOutput::Column(match fetched {
            Fetched::Column(values) => values.clone(),
            _ => Vec::new(),
        }),
        Flavor::Pair => QueryOutput::Pairs(match fetched {
            Fetched::Pairs(pairs) => pairs.clone(),
            _ => Vec::new(),
        }),
        Flavor::Unique => QueryOutput::Unique(match fetched {
            Fetched::Unique(rows) => rows.clone(),
            _ => Vec::new(),
        }),
        Flavor::Row => QueryOutput::Row(fetched.first_row().cloned()),
        Flavor::Value => QueryOutput::Value(fetched.first_value().cloned()),
        Flavor::Count => QueryOutput::Count(fetched.first_value().map_or(0, RowValues::coerce_int)),
        Flavor::Check => QueryOutput::Check(!fetched.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn envelope_with(result: Fetched) -> ResultEnvelope {
        ResultEnvelope {
            last_result: result,
            ..ResultEnvelope::default()
        }
    }

    #[test]
    fn count_coerces_text_and_defaults_to_zero() {
        let env = envelope_with(Fetched::Column(vec![RowValues::Text("42".into())]));
        assert_eq!(shape(Flavor::Count, &env), QueryOutput::Count(42));
        let env = envelope_with(Fetched::Column(Vec::new()));
        assert_eq!(shape(Flavor::Count, &env), QueryOutput::Count(0));
    }

    #[test]
    fn empty_selects_shape_to_empty_values() {
        let env = envelope_with(Fetched::Rows(ResultSet::default()));
        assert_eq!(shape(Flavor::Row, &env), QueryOutput::Row(None));
        assert_eq!(shape(Flavor::Check, &env), QueryOutput::Check(false));
        assert_eq!(shape(Flavor::Row, &env).to_json(), serde_json::json!({}));
        let env = envelope_with(Fetched::Column(Vec::new()));
        assert_eq!(shape(Flavor::Value, &env), QueryOutput::Value(None));
    }

    #[test]
    fn non_select_flavors_read_the_envelope() {
        let env = ResultEnvelope {
            last_affected: 3,
            last_insert_id: LastInsertId::Id("7".into()),
            ..ResultEnvelope::default()
        };
        assert_eq!(shape(Flavor::Affected, &env), QueryOutput::Affected(3));
        assert_eq!(
            shape(Flavor::Increment, &env),
            QueryOutput::InsertId(LastInsertId::Id("7".into()))
        );
        assert_eq!(shape(Flavor::Bool, &env).as_bool(), Some(true));
    }

    #[test]
    fn row_flavor_returns_first_row() {
        let mut rs = ResultSet::default();
        rs.set_column_names(Arc::new(vec!["id".into(), "name".into()]));
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("a".into())]);
        let env = envelope_with(Fetched::Rows(rs));
        let QueryOutput::Row(Some(row)) = shape(Flavor::Row, &env) else {
            panic!("expected a row");
        };
        assert_eq!(row.get("name"), Some(&RowValues::Text("a".into())));
        assert_eq!(shape(Flavor::Check, &env), QueryOutput::Check(true));
    }
}
