//! Typed shortcuts over [`BatchEngine::query`], one per flavor.

use crate::batch::BatchInput;
use crate::binder::Bindings;
use crate::engine::{BatchEngine, QueryOutput};
use crate::error::SqlBatchError;
use crate::flavor::Flavor;
use crate::results::{CustomDbRow, ResultSet};
use crate::state::LastInsertId;
use crate::types::RowValues;

fn mismatch(flavor: Flavor, output: &QueryOutput) -> SqlBatchError {
    SqlBatchError::Other(format!("`{flavor}` query produced {output:?}"))
}

macro_rules! expect_output {
    ($output:expr, $flavor:expr, $pattern:pat => $value:expr) => {
        match $output {
            $pattern => Ok($value),
            other => Err(mismatch($flavor, &other)),
        }
    };
}

impl BatchEngine {
    /// Run a batch for its side effects.
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn execute(
        &mut self,
        statements: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<(), SqlBatchError> {
        self.query(statements, bindings, Flavor::Bool).await.map(|_| ())
    }

    /// Run a single `INSERT` and return the id it generated.
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn insert(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<LastInsertId, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Increment).await?;
        expect_output!(output, Flavor::Increment, QueryOutput::InsertId(id) => id)
    }

    /// Total rows changed by the batch.
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn affected(
        &mut self,
        statements: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<u64, SqlBatchError> {
        let output = self.query(statements, bindings, Flavor::Affected).await?;
        expect_output!(output, Flavor::Affected, QueryOutput::Affected(n) => n)
    }

    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn all(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<ResultSet, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::All).await?;
        expect_output!(output, Flavor::All, QueryOutput::Rows(rs) => rs)
    }

    /// First row of a select; a `LIMIT 0,1` is added when the statement has no
    /// limit of its own.
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn row(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<Option<CustomDbRow>, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Row).await?;
        expect_output!(output, Flavor::Row, QueryOutput::Row(row) => row)
    }

    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn value(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<Option<RowValues>, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Value).await?;
        expect_output!(output, Flavor::Value, QueryOutput::Value(value) => value)
    }

    /// Column `index` of every row.
    ///
    /// # Arguments
    ///
    /// * `statement` - A single select-like statement
    /// * `index` - Zero-based column position
    /// * `bindings` - Values for the statement's placeholders
    ///
    /// # Returns
    ///
    /// One value per row, in row order
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn column(
        &mut self,
        statement: impl Into<BatchInput>,
        index: usize,
        bindings: &Bindings,
    ) -> Result<Vec<RowValues>, SqlBatchError> {
        let flavor = Flavor::Column(index);
        let output = self.query(statement, bindings, flavor).await?;
        expect_output!(output, flavor, QueryOutput::Column(values) => values)
    }

    /// First column mapped to second column, in row order.
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn pairs(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<Vec<(RowValues, RowValues)>, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Pair).await?;
        expect_output!(output, Flavor::Pair, QueryOutput::Pairs(pairs) => pairs)
    }

    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn unique(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<Vec<(RowValues, CustomDbRow)>, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Unique).await?;
        expect_output!(output, Flavor::Unique, QueryOutput::Unique(rows) => rows)
    }

    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn count(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<i64, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Count).await?;
        expect_output!(output, Flavor::Count, QueryOutput::Count(n) => n)
    }

    /// Whether the select returned any row.
    ///
    /// # Errors
    /// See [`BatchEngine::query`].
    pub async fn exists(
        &mut self,
        statement: impl Into<BatchInput>,
        bindings: &Bindings,
    ) -> Result<bool, SqlBatchError> {
        let output = self.query(statement, bindings, Flavor::Check).await?;
        expect_output!(output, Flavor::Check, QueryOutput::Check(found) => found)
    }
}
