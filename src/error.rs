//! Error types for filter translation.

use crate::parser::ParseError;
use thiserror::Error;

/// Every way a filter can be rejected.
///
/// All variants are terminal: translation stops at the first one and no
/// partial [`crate::ParsedQuery`] is produced. A self-contradictory filter is
/// *not* an error; it yields a query with `empty_result` set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The filter is not a syntactically valid expression
    #[error("{0}")]
    Syntax(#[from] ParseError),

    #[error("filter is {length} bytes long, the limit is {limit}")]
    QueryTooLong { length: usize, limit: usize },

    #[error("only comparison and \"and\" expression is supported: {0}")]
    UnsupportedExpression(String),

    #[error("invalid filter name: {0}")]
    InvalidFieldReference(String),

    #[error("invalid value: {0}")]
    InvalidLiteral(String),

    /// Carries the name of the field the operator was applied to
    #[error("only operator = is supported for {0}")]
    UnsupportedOperator(String),

    #[error("unknown filter name: {0}")]
    UnknownField(String),

    #[error("value {0} is not a string value")]
    NotAStringLiteral(String),

    #[error("invalid value for SearchPrecision: {0}")]
    InvalidPrecisionValue(String),

    #[error("only one expression is allowed for SearchPrecision, got {existing} and {value}")]
    DuplicatePrecision { existing: String, value: String },

    #[error("invalid timestamp {value}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("requires a StartTime or CloseTime")]
    MissingTimeFilter,

    #[error("SearchPrecision is required when searching for a StartTime or CloseTime")]
    MissingPrecision,
}

impl QueryError {
    pub(crate) fn invalid_timestamp(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
