//! Normalizing caller input into the canonical batch that the executor runs.

mod input;

use std::collections::VecDeque;

pub use input::{BatchInput, bindings_from_json};

use crate::binder::Bindings;
use crate::classify::{has_limit_clause, is_comment_only, is_insert, is_select_like, with_single_row_limit};
use crate::error::SqlBatchError;
use crate::flavor::Flavor;
use crate::split::split_statements;

/// One statement and the bindings it executes with.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementUnit {
    text: String,
    bindings: Bindings,
}

impl StatementUnit {
    /// Create a statement unit
    ///
    /// # Arguments
    ///
    /// * `text` - The statement, with or without a trailing `;`
    /// * `bindings` - Values for the statement's placeholders
    ///
    /// # Errors
    /// Returns `SqlBatchError::Validation` if `text` is blank.
    pub fn new(text: impl Into<String>, bindings: Bindings) -> Result<Self, SqlBatchError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SqlBatchError::validation("statement text is blank"));
        }
        Ok(Self { text, bindings })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    #[must_use]
    pub fn is_select_like(&self) -> bool {
        is_select_like(&self.text)
    }
}

/// The validated, ordered statements of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    units: VecDeque<StatementUnit>,
    select_like: bool,
    use_transaction: bool,
}

impl Batch {
    /// Normalize `input`, merge `globals` under each unit's own bindings, drop
    /// what the batch cannot run, and check `flavor` against the resulting
    /// shape.
    ///
    /// # Arguments
    ///
    /// * `input` - The caller's statements in any supported form
    /// * `globals` - Bindings shared by every statement
    /// * `flavor` - The requested result shape
    ///
    /// # Returns
    ///
    /// The batch to execute. A single select-like statement runs without a
    /// transaction; everything else runs inside one.
    ///
    /// # Errors
    /// Returns `SqlBatchError::Validation` for blank input, blank statements, a
    /// batch left empty after filtering (a lone comment included), or a flavor
    /// the batch cannot serve.
    pub fn prepare(
        input: BatchInput,
        globals: &Bindings,
        flavor: Flavor,
    ) -> Result<Self, SqlBatchError> {
        let pairs: Vec<(String, Bindings)> = match input {
            BatchInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(SqlBatchError::validation("query text is blank"));
                }
                split_statements(&text)
                    .into_iter()
                    .map(|sql| (sql, Bindings::new()))
                    .collect()
            }
            BatchInput::Statements(texts) => {
                texts.into_iter().map(|sql| (sql, Bindings::new())).collect()
            }
            BatchInput::Pairs(pairs) => pairs,
            BatchInput::Units(units) => units
                .into_iter()
                .map(|unit| (unit.text, unit.bindings))
                .collect(),
        };

        let mut units = pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (text, bindings))| {
                StatementUnit::new(text, bindings.merged_over(globals)).map_err(|_| {
                    SqlBatchError::validation(format!("statement {idx} is blank"))
                })
            })
            .collect::<Result<VecDeque<_>, _>>()?;

        let multi = units.len() > 1;
        units.retain(|unit| {
            let keep = !is_comment_only(&unit.text) && !(multi && unit.is_select_like());
            if !keep {
                tracing::debug!(
                    statement = %unit.text,
                    "dropping comment or select-like statement from batch"
                );
            }
            keep
        });
        let Some(first) = units.front() else {
            return Err(SqlBatchError::validation(
                "batch contains no executable statements",
            ));
        };

        let single = units.len() == 1;
        let select_like = single && first.is_select_like();
        let insert = single && is_insert(&first.text);
        if !flavor.is_compatible(units.len(), select_like, insert) {
            let shape = if !single {
                format!("a batch of {} statements", units.len())
            } else if select_like {
                "a select-like statement".to_string()
            } else {
                "a non-select statement".to_string()
            };
            return Err(SqlBatchError::validation(format!(
                "flavor `{flavor}` cannot be used with {shape}"
            )));
        }

        if select_like
            && flavor.wants_single_row()
            && let Some(unit) = units.front_mut()
            && !has_limit_clause(&unit.text)
        {
            unit.text = with_single_row_limit(&unit.text);
        }

        Ok(Self {
            units,
            select_like,
            use_transaction: !select_like,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// True for a single select-like statement.
    #[must_use]
    pub fn is_select_like(&self) -> bool {
        self.select_like
    }

    /// Whether the executor wraps the batch in a transaction.
    #[must_use]
    pub fn uses_transaction(&self) -> bool {
        self.use_transaction
    }

    pub fn units(&self) -> impl Iterator<Item = &StatementUnit> {
        self.units.iter()
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&StatementUnit> {
        self.units.get(idx)
    }

    /// Drop the first statement once it has run outside a transaction.
    pub(crate) fn complete_front(&mut self) {
        self.units.pop_front();
    }
}
