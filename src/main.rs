use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use archive_filter::token::Span;
use archive_filter::{FilterQueryParser, ParserConfig, QueryError, QueryParser};
use clap::Parser;
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const DEFAULT_CONFIG_FILE: &str = "query_parser.json";

#[derive(Parser)]
#[command(author, version, about = "Translate archive filters into query descriptors")]
struct Cli {
    /// JSON parser configuration; falls back to built-in defaults when unreadable
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Filter to parse. Starts an interactive session when omitted
    filter: Option<String>,
}

/// 创建解析器实例，优先使用JSON配置，失败时使用默认配置
fn create_parser_with_config(path: &Path) -> FilterQueryParser {
    match ParserConfig::from_json_file(path) {
        Ok(config) => {
            info!("loaded parser configuration from {}", path.display());
            FilterQueryParser::with_config(config)
        }
        Err(e) => {
            warn!("{}, using default configuration", e);
            FilterQueryParser::new()
        }
    }
}

fn render(parser: &FilterQueryParser, filter: &str) -> Result<String, QueryError> {
    let query = parser.parse(filter)?;
    // ParsedQuery only holds strings, integers and unit enums
    Ok(serde_json::to_string_pretty(&query).unwrap_or_else(|e| e.to_string()))
}

/// Marks the byte span under the filter, counted in characters
fn caret_line(filter: &str, span: Span) -> String {
    let width = |text: Option<&str>| text.map(|t| t.chars().count());
    let pad = width(filter.get(..span.start)).unwrap_or(span.start);
    let len = width(filter.get(span.start..span.end))
        .unwrap_or(span.end.saturating_sub(span.start));
    format!("{}{}", " ".repeat(pad), "^".repeat(len.max(1)))
}

fn describe(err: &QueryError, filter: &str) -> String {
    match err {
        QueryError::Syntax(parse_error) => match parse_error.span {
            Some(span) => format!(
                "syntax error at {}-{}: {}\n  {}\n  {}",
                span.start,
                span.end,
                parse_error.message,
                filter,
                caret_line(filter, span),
            ),
            None => format!("syntax error: {}", parse_error.message),
        },
        other => other.to_string(),
    }
}

fn run_interactive(parser: &FilterQueryParser) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    println!("Enter a filter per line, `exit` to quit.");

    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let filter = line.trim();
                if filter.is_empty() {
                    continue;
                }
                if filter == "exit" || filter == "quit" {
                    break;
                }
                editor.add_history_entry(filter)?;
                match render(parser, filter) {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("✗ {}", describe(&e, filter)),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let parser = create_parser_with_config(&cli.config);

    match cli.filter {
        Some(filter) => {
            let json = render(&parser, &filter).map_err(|e| anyhow::anyhow!(describe(&e, &filter)))?;
            println!("{}", json);
            Ok(())
        }
        None => run_interactive(&parser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_counts_characters() {
        assert_eq!(caret_line("RunID = 'a' RunID", Span::new(12, 17)), format!("{}^^^^^", " ".repeat(12)));
        // "é" and "工" are 2 and 3 bytes wide, so byte 16 is character 13
        assert_eq!(caret_line("RunID = 'é工' x", Span::new(16, 17)), format!("{}^", " ".repeat(13)));
    }

    #[test]
    fn test_describe_syntax_error() {
        let parser = FilterQueryParser::new();
        let filter = "WorkflowID = 'é' ?";
        let err = parser.parse(filter).unwrap_err();
        assert_eq!(
            describe(&err, filter),
            format!(
                "syntax error at 18-19: Unexpected token: Illegal\n  {}\n  {}^",
                filter,
                " ".repeat(17)
            )
        );
    }
}
