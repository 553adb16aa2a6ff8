//! Typed errors raised by list decoding and aggregation.
//!
//! Classification never fails per column, so nothing here is produced by
//! [`crate::classify`]. Command handlers wrap these in `anyhow` context.

use thiserror::Error;

/// Failure to read a serialized list such as `['A', 'B']`.
#[derive(Debug, Error)]
pub enum ListParseError {
    #[error("not valid JSON after quote normalization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON array")]
    NotAnArray,

    #[error("list element is a nested array or object")]
    NestedElement,
}

/// A token outside one of the closed sets recognized by the crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'. Supported values: {expected}")]
pub struct UnknownEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

impl UnknownEnumError {
    pub fn new(kind: &'static str, value: &str, expected: &[&str]) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected: expected.join(", "),
        }
    }
}

/// Errors that abort the aggregation of a single column.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Target or group column is not part of the table.
    #[error("column '{column}' not found in table")]
    ColumnNotFound { column: String },

    /// A multi-select value did not decode as a list.
    #[error("column '{column}' row {row}: cannot decode '{value}' as a list: {source}")]
    Parse {
        column: String,
        row: usize,
        value: String,
        #[source]
        source: ListParseError,
    },

    /// A value contradicts the type the column was aggregated as.
    #[error("column '{column}' row {row}: value '{value}' is not {expected}")]
    SchemaMismatch {
        column: String,
        row: usize,
        value: String,
        expected: &'static str,
    },
}
