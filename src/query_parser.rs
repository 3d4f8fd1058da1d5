//! Translates a WHERE-style filter into a [`ParsedQuery`].
//!
//! Only a narrow subset of SQL is accepted: equality comparisons on a fixed
//! set of fields, combined with `AND` and parentheses. For example:
//!
//! ```text
//! WorkflowID = 'wf1' AND StartTime = '2020-01-01T00:00:00Z' AND SearchPrecision = 'Day'
//! ```
//!
//! Asserting two different values for `WorkflowID`, `RunID` or `WorkflowType`
//! does not fail; it produces a query flagged as `empty_result`.

use chrono::DateTime;
use log::{debug, trace};

use crate::ast::{CompOp, Expr, Statement};
use crate::config::ParserConfig;
use crate::error::QueryError;
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};
use crate::query::{
    ParsedQuery, Precision, CLOSE_TIME, RUN_ID, SEARCH_PRECISION, START_TIME, WORKFLOW_ID,
    WORKFLOW_TYPE,
};

/// The filter is spliced into this statement before parsing.
const QUERY_TEMPLATE_PREFIX: &str = "select * from dummy where ";

/// Parses a limited SQL where clause into a [`ParsedQuery`].
pub trait QueryParser {
    fn parse(&self, query: &str) -> Result<ParsedQuery, QueryError>;
}

/// Stateless [`QueryParser`]; safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct FilterQueryParser {
    config: ParserConfig,
}

impl FilterQueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Builds the expression tree of the filter's WHERE clause.
    fn where_expr(&self, query: &str) -> Result<Expr, QueryError> {
        let statement = format!("{}{}", QUERY_TEMPLATE_PREFIX, query);
        let tokens: Vec<_> = Lexer::new(&statement).collect();
        let mut parser = Parser::with_max_depth(&tokens, self.config.max_expression_depth);
        let statement = parser
            .parse()
            .map_err(|err| err.shifted_back(QUERY_TEMPLATE_PREFIX.len()))?;

        match statement {
            Statement::Select { selection: Some(expr), .. } => Ok(expr),
            Statement::Select { selection: None, .. } => Err(QueryError::Syntax(ParseError {
                message: "where expression is nil".to_string(),
                span: None,
            })),
        }
    }
}

impl QueryParser for FilterQueryParser {
    fn parse(&self, query: &str) -> Result<ParsedQuery, QueryError> {
        if let Some(limit) = self.config.max_query_length {
            if query.len() > limit {
                return Err(QueryError::QueryTooLong { length: query.len(), limit });
            }
        }

        let expr = self.where_expr(query)?;
        let mut parsed = ParsedQuery::default();
        convert_where_expr(&expr, &mut parsed)?;

        if parsed.time_filter().is_none() {
            return Err(QueryError::MissingTimeFilter);
        }
        if parsed.search_precision.is_none() {
            return Err(QueryError::MissingPrecision);
        }

        debug!("parsed filter {:?} into {:?}", query, parsed);
        Ok(parsed)
    }
}

/// Parses `query` with the default configuration.
pub fn parse(query: &str) -> Result<ParsedQuery, QueryError> {
    FilterQueryParser::new().parse(query)
}

/// Filterable fields. [`CLOSE_STATUS`](crate::query::CLOSE_STATUS) is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    WorkflowId,
    RunId,
    WorkflowType,
    StartTime,
    CloseTime,
    SearchPrecision,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            WORKFLOW_ID => Some(Field::WorkflowId),
            RUN_ID => Some(Field::RunId),
            WORKFLOW_TYPE => Some(Field::WorkflowType),
            START_TIME => Some(Field::StartTime),
            CLOSE_TIME => Some(Field::CloseTime),
            SEARCH_PRECISION => Some(Field::SearchPrecision),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Field::WorkflowId => WORKFLOW_ID,
            Field::RunId => RUN_ID,
            Field::WorkflowType => WORKFLOW_TYPE,
            Field::StartTime => START_TIME,
            Field::CloseTime => CLOSE_TIME,
            Field::SearchPrecision => SEARCH_PRECISION,
        }
    }
}

fn convert_where_expr(expr: &Expr, parsed: &mut ParsedQuery) -> Result<(), QueryError> {
    match expr {
        Expr::Comparison { left, op, right } => convert_comparison_expr(left, *op, right, parsed),
        Expr::And(left, right) => {
            convert_where_expr(left, parsed)?;
            convert_where_expr(right, parsed)
        }
        Expr::Paren(inner) => convert_where_expr(inner, parsed),
        other => Err(QueryError::UnsupportedExpression(other.to_string())),
    }
}

fn convert_comparison_expr(
    left: &Expr,
    op: CompOp,
    right: &Expr,
    parsed: &mut ParsedQuery,
) -> Result<(), QueryError> {
    let Expr::Column(column) = left else {
        return Err(QueryError::InvalidFieldReference(left.to_string()));
    };
    let Expr::Literal(literal) = right else {
        return Err(QueryError::InvalidLiteral(right.to_string()));
    };
    let name = column.to_string();
    let raw = literal.raw();
    trace!("filter comparison: {} {} {}", name, op, raw);

    let Some(field) = Field::from_name(&name) else {
        return Err(QueryError::UnknownField(name));
    };

    match field {
        Field::WorkflowId => {
            assert_data_field(field, op, raw, &mut parsed.workflow_id, &mut parsed.empty_result)
        }
        Field::RunId => {
            assert_data_field(field, op, raw, &mut parsed.run_id, &mut parsed.empty_result)
        }
        Field::WorkflowType => {
            assert_data_field(field, op, raw, &mut parsed.workflow_type, &mut parsed.empty_result)
        }
        Field::StartTime => {
            let timestamp = convert_to_timestamp(raw)?;
            require_equality(field, op)?;
            parsed.start_time = timestamp;
            Ok(())
        }
        Field::CloseTime => {
            let timestamp = convert_to_timestamp(raw)?;
            require_equality(field, op)?;
            parsed.close_time = timestamp;
            Ok(())
        }
        Field::SearchPrecision => {
            let value = extract_string_value(raw)?;
            require_equality(field, op)?;
            // a repeat must match the earlier value exactly, before it is validated
            if let Some(existing) = parsed.search_precision {
                if existing.as_str() != value {
                    return Err(QueryError::DuplicatePrecision {
                        existing: existing.to_string(),
                        value,
                    });
                }
            }
            let precision = value
                .parse::<Precision>()
                .map_err(|unknown| QueryError::InvalidPrecisionValue(unknown.0))?;
            parsed.search_precision = Some(precision);
            Ok(())
        }
    }
}

fn require_equality(field: Field, op: CompOp) -> Result<(), QueryError> {
    if op == CompOp::Eq {
        Ok(())
    } else {
        Err(QueryError::UnsupportedOperator(field.name().to_string()))
    }
}

/// Records an equality assertion on a string field that filters rows.
///
/// A value conflicting with an earlier assertion leaves the field as it was
/// and marks the whole query as unsatisfiable.
fn assert_data_field(
    field: Field,
    op: CompOp,
    raw: &str,
    slot: &mut Option<String>,
    empty_result: &mut bool,
) -> Result<(), QueryError> {
    let value = extract_string_value(raw)?;
    require_equality(field, op)?;
    if let Err(existing) = set_once(slot, value) {
        debug!(
            "conflicting values for {}: {:?} and {}, query matches nothing",
            field.name(),
            existing,
            raw
        );
        *empty_result = true;
    }
    Ok(())
}

/// Stores `value` unless the slot already holds a different one, in which
/// case the existing value is returned.
fn set_once<T: PartialEq + Clone>(slot: &mut Option<T>, value: T) -> Result<(), T> {
    if let Some(existing) = slot.as_ref() {
        if *existing != value {
            return Err(existing.clone());
        }
    }
    *slot = Some(value);
    Ok(())
}

/// Converts a literal into nanoseconds since the Unix epoch.
///
/// Accepts a base-10 integer, taken as nanoseconds already, or a quoted
/// RFC 3339 date-time.
pub fn convert_to_timestamp(raw: &str) -> Result<i64, QueryError> {
    if let Ok(timestamp) = raw.parse::<i64>() {
        return Ok(timestamp);
    }
    let text = extract_string_value(raw).map_err(|_| {
        QueryError::invalid_timestamp(raw, "expected an integer or a quoted RFC 3339 date-time")
    })?;
    let parsed = DateTime::parse_from_rfc3339(&text)
        .map_err(|err| QueryError::invalid_timestamp(raw, err))?;
    parsed
        .timestamp_nanos_opt()
        .ok_or_else(|| QueryError::invalid_timestamp(raw, "outside the nanosecond timestamp range"))
}

/// Strips the single quotes around a string literal, unescaping `''`.
pub fn extract_string_value(raw: &str) -> Result<String, QueryError> {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        Ok(raw[1..raw.len() - 1].replace("''", "'"))
    } else {
        Err(QueryError::NotAStringLiteral(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{TimeFilter, CLOSE_STATUS};
    use crate::token::Span;
    use pretty_assertions::assert_eq;

    const JAN_1_2020_NANOS: i64 = 1_577_836_800_000_000_000;

    #[test]
    fn test_workflow_id_with_rfc3339_start_time() {
        let query =
            parse("WorkflowID = 'wf1' AND StartTime = '2020-01-01T00:00:00Z' AND SearchPrecision = 'Day'")
                .unwrap();

        assert_eq!(query.workflow_id(), Some("wf1"));
        assert_eq!(query.run_id(), None);
        assert_eq!(query.workflow_type(), None);
        assert_eq!(query.start_time(), JAN_1_2020_NANOS);
        assert_eq!(query.close_time(), 0);
        assert_eq!(query.search_precision(), Some(Precision::Day));
        assert!(!query.empty_result());
    }

    #[test]
    fn test_both_time_filters_rejected() {
        let err = parse("StartTime = 100 AND CloseTime = 200 AND SearchPrecision = 'Hour'").unwrap_err();
        assert_eq!(err, QueryError::MissingTimeFilter);
    }

    #[test]
    fn test_conflicting_workflow_type_yields_empty_result() {
        let query =
            parse("WorkflowType = 'x' AND WorkflowType = 'y' AND StartTime = 1 AND SearchPrecision = 'Second'")
                .unwrap();
        assert!(query.empty_result());
        assert_eq!(query.workflow_type(), Some("x"));
        assert_eq!(query.start_time(), 1);
    }

    #[test]
    fn test_close_status_is_unknown() {
        let err = parse("CloseStatus = 'Completed' AND StartTime = 1 AND SearchPrecision = 'Minute'").unwrap_err();
        assert_eq!(err, QueryError::UnknownField(CLOSE_STATUS.to_string()));
    }

    #[test]
    fn test_range_comparison_on_time_rejected() {
        let err = parse("StartTime > 100 AND SearchPrecision = 'Day'").unwrap_err();
        assert_eq!(err, QueryError::UnsupportedOperator("StartTime".to_string()));
    }

    #[test]
    fn test_close_time_filter() {
        let query = parse("CloseTime = 1234567 AND RunID = 'r1' AND SearchPrecision = 'Minute'").unwrap();
        assert_eq!(query.time_filter(), Some(TimeFilter::CloseTime(1234567)));
        assert_eq!(query.run_id(), Some("r1"));
        assert_eq!(query.start_time(), 0);
    }

    #[test]
    fn test_no_time_filter_rejected() {
        let err = parse("WorkflowID = 'a' AND SearchPrecision = 'Day'").unwrap_err();
        assert_eq!(err, QueryError::MissingTimeFilter);
    }

    #[test]
    fn test_zero_timestamp_counts_as_unset() {
        let err = parse("StartTime = 0 AND SearchPrecision = 'Day'").unwrap_err();
        assert_eq!(err, QueryError::MissingTimeFilter);
    }

    #[test]
    fn test_missing_precision() {
        let err = parse("StartTime = 100 AND WorkflowID = 'a'").unwrap_err();
        assert_eq!(err, QueryError::MissingPrecision);
    }

    #[test]
    fn test_negative_timestamp() {
        let query = parse("StartTime = -5 AND SearchPrecision = 'Day'").unwrap();
        assert_eq!(query.start_time(), -5);
    }

    #[test]
    fn test_last_time_assertion_wins() {
        let query = parse("StartTime = 5 AND StartTime = 7 AND SearchPrecision = 'Day'").unwrap();
        assert_eq!(query.start_time(), 7);
    }

    #[test]
    fn test_integer_and_rfc3339_forms_agree() {
        let cases = [
            ("'2020-01-01T00:00:00Z'", JAN_1_2020_NANOS),
            ("'2020-01-01T08:00:00+08:00'", JAN_1_2020_NANOS),
            ("'2020-01-01T00:00:00.000000123Z'", JAN_1_2020_NANOS + 123),
            ("'1969-12-31T23:59:59Z'", -1_000_000_000),
        ];
        for (literal, nanos) in cases {
            let from_text = parse(&format!("StartTime = {} AND SearchPrecision = 'Second'", literal)).unwrap();
            let from_int = parse(&format!("StartTime = {} AND SearchPrecision = 'Second'", nanos)).unwrap();
            assert_eq!(from_text.start_time(), nanos, "{}", literal);
            assert_eq!(from_text, from_int);
        }
    }

    #[test]
    fn test_repeated_identical_values_are_not_empty() {
        let query = parse(
            "RunID = 'r' AND RunID = 'r' AND SearchPrecision = 'Day' AND SearchPrecision = 'Day' AND StartTime = 1",
        )
        .unwrap();
        assert!(!query.empty_result());
        assert_eq!(query.run_id(), Some("r"));
        assert_eq!(query.search_precision(), Some(Precision::Day));
    }

    #[test]
    fn test_conflicts_on_each_data_field() {
        for field in ["WorkflowID", "RunID", "WorkflowType"] {
            let filter = format!(
                "{field} = 'a' AND StartTime = 1 AND ({field} = 'b') AND SearchPrecision = 'Hour'"
            );
            let query = parse(&filter).unwrap();
            assert!(query.empty_result(), "{}", field);
        }
    }

    #[test]
    fn test_conflicting_precision_is_an_error() {
        let err = parse("StartTime = 1 AND SearchPrecision = 'Day' AND SearchPrecision = 'Hour'").unwrap_err();
        assert_eq!(
            err,
            QueryError::DuplicatePrecision {
                existing: "Day".to_string(),
                value: "Hour".to_string(),
            }
        );
    }

    #[test]
    fn test_conflict_checked_before_precision_value() {
        let err = parse("StartTime = 1 AND SearchPrecision = 'Day' AND SearchPrecision = 'Week'").unwrap_err();
        assert!(matches!(err, QueryError::DuplicatePrecision { .. }));
    }

    #[test]
    fn test_invalid_precision_values() {
        for value in ["'Week'", "'day'", "''"] {
            let err = parse(&format!("StartTime = 1 AND SearchPrecision = {}", value)).unwrap_err();
            assert_eq!(
                err,
                QueryError::InvalidPrecisionValue(value.trim_matches('\'').to_string())
            );
        }
    }

    #[test]
    fn test_string_fields_require_quotes() {
        let err = parse("WorkflowID = 123 AND StartTime = 1 AND SearchPrecision = 'Day'").unwrap_err();
        assert_eq!(err, QueryError::NotAStringLiteral("123".to_string()));

        let err = parse("StartTime = 1 AND SearchPrecision = 1").unwrap_err();
        assert_eq!(err, QueryError::NotAStringLiteral("1".to_string()));
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let query = parse("WorkflowType = 'it''s' AND StartTime = 1 AND SearchPrecision = 'Day'").unwrap();
        assert_eq!(query.workflow_type(), Some("it's"));
    }

    #[test]
    fn test_double_quotes_and_backquoted_fields() {
        let query = parse(r#"`WorkflowID` = "wf1" AND `StartTime` = 1 AND SearchPrecision = "Hour""#).unwrap();
        assert_eq!(query.workflow_id(), Some("wf1"));
        assert_eq!(query.search_precision(), Some(Precision::Hour));

        let from_double = parse(r#"CloseTime = "2020-01-01T00:00:00Z" AND SearchPrecision = 'Day'"#).unwrap();
        assert_eq!(from_double.close_time(), JAN_1_2020_NANOS);
    }

    #[test]
    fn test_unsupported_operators() {
        let cases = [
            ("WorkflowID != 'a'", "WorkflowID"),
            ("RunID LIKE 'a%'", "RunID"),
            ("WorkflowType <= 'b'", "WorkflowType"),
            ("CloseTime < 100", "CloseTime"),
            ("SearchPrecision <> 'Day'", "SearchPrecision"),
        ];
        for (filter, field) in cases {
            let err = parse(filter).unwrap_err();
            assert_eq!(err, QueryError::UnsupportedOperator(field.to_string()), "{}", filter);
        }
    }

    #[test]
    fn test_unsupported_expressions() {
        let cases = [
            "RunID = 'a' OR RunID = 'b'",
            "NOT RunID = 'a'",
            "RunID IS NULL",
            "RunID",
            "now()",
        ];
        for filter in cases {
            let err = parse(filter).unwrap_err();
            assert!(matches!(err, QueryError::UnsupportedExpression(_)), "{}: {:?}", filter, err);
        }
    }

    #[test]
    fn test_or_expression_is_reported_verbatim() {
        let err = parse("StartTime = 1 AND (RunID = 'a' OR RunID = 'b')").unwrap_err();
        assert_eq!(
            err,
            QueryError::UnsupportedExpression("RunID = 'a' or RunID = 'b'".to_string())
        );
    }

    #[test]
    fn test_left_side_must_be_a_field() {
        let err = parse("'wf1' = WorkflowID").unwrap_err();
        assert_eq!(err, QueryError::InvalidFieldReference("'wf1'".to_string()));
    }

    #[test]
    fn test_right_side_must_be_a_literal() {
        let cases = [
            ("WorkflowID = RunID", "RunID"),
            ("WorkflowID = NULL", "null"),
            ("WorkflowID = TRUE", "true"),
            ("WorkflowID IN ('a', 'b')", "('a', 'b')"),
            ("StartTime = now()", "now()"),
        ];
        for (filter, shown) in cases {
            let err = parse(filter).unwrap_err();
            assert_eq!(err, QueryError::InvalidLiteral(shown.to_string()), "{}", filter);
        }
    }

    #[test]
    fn test_field_names_are_exact() {
        let err = parse("workflowid = 'a'").unwrap_err();
        assert_eq!(err, QueryError::UnknownField("workflowid".to_string()));

        let err = parse("t.WorkflowID = 'a'").unwrap_err();
        assert_eq!(err, QueryError::UnknownField("t.WorkflowID".to_string()));
    }

    #[test]
    fn test_invalid_timestamps() {
        for literal in ["'yesterday'", "1.5", "99999999999999999999", "'2020-13-01T00:00:00Z'", "'3000-01-01T00:00:00Z'"] {
            let err = parse(&format!("StartTime = {} AND SearchPrecision = 'Day'", literal)).unwrap_err();
            match err {
                QueryError::InvalidTimestamp { value, .. } => assert_eq!(value, literal),
                other => panic!("{}: unexpected error {:?}", literal, other),
            }
        }
    }

    #[test]
    fn test_first_error_short_circuits() {
        let err = parse("Foo = 1 AND Bar = 2").unwrap_err();
        assert_eq!(err, QueryError::UnknownField("Foo".to_string()));
    }

    #[test]
    fn test_syntax_error_span_is_relative_to_filter() {
        let err = parse("RunID = 'a' RunID").unwrap_err();
        let QueryError::Syntax(parse_error) = err else {
            panic!("expected syntax error, got {:?}", err);
        };
        assert_eq!(parse_error.span, Some(Span::new(12, 17)));
    }

    #[test]
    fn test_empty_and_truncated_filters_are_syntax_errors() {
        for filter in ["", "   ", "WorkflowID =", "(StartTime = 1", "StartTime = 1 AND"] {
            assert!(matches!(parse(filter), Err(QueryError::Syntax(_))), "{:?}", filter);
        }
    }

    #[test]
    fn test_nested_parentheses() {
        let query = parse("((StartTime = 1) AND ((SearchPrecision = 'Day') AND RunID = 'r'))").unwrap();
        assert_eq!(query.run_id(), Some("r"));
    }

    #[test]
    fn test_configured_limits() {
        let parser = FilterQueryParser::with_config(ParserConfig {
            max_expression_depth: 2,
            max_query_length: Some(64),
        });

        let err = parser.parse("(((StartTime = 1))) AND SearchPrecision = 'Day'").unwrap_err();
        assert!(matches!(err, QueryError::Syntax(_)));

        let long = format!("WorkflowID = '{}' AND StartTime = 1 AND SearchPrecision = 'Day'", "w".repeat(64));
        let err = parser.parse(&long).unwrap_err();
        assert_eq!(err, QueryError::QueryTooLong { length: long.len(), limit: 64 });

        assert!(parser.parse("StartTime = 1 AND SearchPrecision = 'Day'").is_ok());
    }

    #[test]
    fn test_defaults_accept_deep_nesting() {
        let filter = format!(
            "{}StartTime = 1{} AND SearchPrecision = 'Day'",
            "(".repeat(40),
            ")".repeat(40)
        );
        let query = parse(&filter).unwrap();
        assert_eq!(query.start_time(), 1);
    }

    #[test]
    fn test_defaults_accept_long_values() {
        let workflow_id = "w".repeat(4096);
        let filter = format!("WorkflowID = '{}' AND StartTime = 1 AND SearchPrecision = 'Day'", workflow_id);
        let query = parse(&filter).unwrap();
        assert_eq!(query.workflow_id(), Some(workflow_id.as_str()));
    }

    #[test]
    fn test_parser_is_shareable_across_threads() {
        let parser = FilterQueryParser::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=8i64)
                .map(|i| {
                    let parser = &parser;
                    scope.spawn(move || {
                        parser
                            .parse(&format!("CloseTime = {} AND SearchPrecision = 'Hour'", i))
                            .map(|query| query.close_time())
                    })
                })
                .collect();
            for (i, handle) in (1..=8i64).zip(handles) {
                assert_eq!(handle.join().unwrap(), Ok(i));
            }
        });
    }

    #[test]
    fn test_extract_string_value() {
        assert_eq!(extract_string_value("'abc'"), Ok("abc".to_string()));
        assert_eq!(extract_string_value("''"), Ok(String::new()));
        assert_eq!(
            extract_string_value("'abc"),
            Err(QueryError::NotAStringLiteral("'abc".to_string()))
        );
        assert!(extract_string_value("'").is_err());
    }

    #[test]
    fn test_set_once() {
        let mut slot = None;
        assert_eq!(set_once(&mut slot, 1), Ok(()));
        assert_eq!(set_once(&mut slot, 1), Ok(()));
        assert_eq!(set_once(&mut slot, 2), Err(1));
        assert_eq!(slot, Some(1));
    }
}
