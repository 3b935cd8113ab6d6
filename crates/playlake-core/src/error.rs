//! Error types for the transformation core

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use thiserror::Error;

/// Errors raised by relational operators and table builders.
///
/// Unmatched joins and duplicate natural keys are not errors: the first drops
/// the row, the second is resolved by the dimension's ordering.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A referenced column does not exist in the input table
    #[error("column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },

    /// A column exists but has a type the operator cannot handle
    #[error("column '{column}' has type {actual}, expected {expected}")]
    UnexpectedType {
        column: String,
        expected: String,
        actual: DataType,
    },

    /// Two inputs of a join or projection would produce the same column name
    #[error("column '{column}' would appear twice in the output")]
    ColumnCollision { column: String },

    /// Underlying Arrow kernel failure
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl TransformError {
    pub(crate) fn missing_column(column: &str, schema: &arrow::datatypes::Schema) -> Self {
        let available = schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::MissingColumn {
            column: column.to_string(),
            available,
        }
    }

    pub(crate) fn unexpected_type(column: &str, expected: &str, actual: &DataType) -> Self {
        Self::UnexpectedType {
            column: column.to_string(),
            expected: expected.to_string(),
            actual: actual.clone(),
        }
    }
}

/// Result type alias for TransformError
pub type Result<T> = std::result::Result<T, TransformError>;
