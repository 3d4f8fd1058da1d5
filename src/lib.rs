//! Translates a restricted SQL WHERE clause into a typed query over archived
//! workflow executions.
//!
//! ```
//! use archive_filter::{parse, Precision};
//!
//! let query = parse("WorkflowID = 'wf1' AND StartTime = 1 AND SearchPrecision = 'Day'").unwrap();
//! assert_eq!(query.workflow_id(), Some("wf1"));
//! assert_eq!(query.search_precision(), Some(Precision::Day));
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod query_parser;
pub mod token;

pub use config::{ConfigError, ParserConfig};
pub use error::QueryError;
pub use query::{ParsedQuery, Precision, TimeFilter};
pub use query_parser::{parse, FilterQueryParser, QueryParser};
