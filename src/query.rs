//! The descriptor produced by filter translation.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// All allowed fields for filtering
pub const WORKFLOW_ID: &str = "WorkflowID";
pub const RUN_ID: &str = "RunID";
pub const WORKFLOW_TYPE: &str = "WorkflowType";
pub const CLOSE_TIME: &str = "CloseTime";
pub const START_TIME: &str = "StartTime";
/// Recognized by name but never supported as a filter
pub const CLOSE_STATUS: &str = "CloseStatus";
pub const SEARCH_PRECISION: &str = "SearchPrecision";

/// Time-bucket granularity used by the storage layer to locate archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Precision {
    Day,
    Hour,
    Minute,
    Second,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Day => "Day",
            Precision::Hour => "Hour",
            Precision::Minute => "Minute",
            Precision::Second => "Second",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a string that is not one of the precision literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPrecision(pub String);

impl FromStr for Precision {
    type Err = UnknownPrecision;

    /// Matching is case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Day" => Ok(Precision::Day),
            "Hour" => Ok(Precision::Hour),
            "Minute" => Ok(Precision::Minute),
            "Second" => Ok(Precision::Second),
            other => Err(UnknownPrecision(other.to_string())),
        }
    }
}

/// The active time filter of a validated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    StartTime(i64),
    CloseTime(i64),
}

/// A validated, normalized filter over archived workflow executions.
///
/// Timestamps are nanoseconds since the Unix epoch, with zero meaning unset.
/// A query returned by the parser always has exactly one of `start_time`
/// and `close_time` set, plus a search precision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub(crate) workflow_id: Option<String>,
    pub(crate) run_id: Option<String>,
    pub(crate) workflow_type: Option<String>,
    pub(crate) start_time: i64,
    pub(crate) close_time: i64,
    pub(crate) search_precision: Option<Precision>,
    pub(crate) empty_result: bool,
}

impl ParsedQuery {
    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn workflow_type(&self) -> Option<&str> {
        self.workflow_type.as_deref()
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn close_time(&self) -> i64 {
        self.close_time
    }

    pub fn search_precision(&self) -> Option<Precision> {
        self.search_precision
    }

    /// True when the filter can never match a record; the caller should
    /// return no results without touching storage.
    pub fn empty_result(&self) -> bool {
        self.empty_result
    }

    /// Returns the single time filter, or `None` when neither or both
    /// timestamps are set.
    pub fn time_filter(&self) -> Option<TimeFilter> {
        match (self.start_time, self.close_time) {
            (0, 0) => None,
            (start, 0) => Some(TimeFilter::StartTime(start)),
            (0, close) => Some(TimeFilter::CloseTime(close)),
            _ => None,
        }
    }
}
