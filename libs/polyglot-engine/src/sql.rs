//! SQL safety filter and ephemeral database runner
//!
//! User SQL runs against a fresh in-memory SQLite database that lives exactly
//! as long as one execution. Each user statement is screened against a
//! blocklist of schema and administrative commands; a rejected statement
//! becomes an error record at its position and its siblings still run.

use crate::engine::TIMEOUT_EXIT_CODE;
use crate::error::SqlRejection;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lazy_static::lazy_static;
use polyglot_common::types::{ExecutionResult, FailureKind};
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest statement prefix echoed back in an error record
const STATEMENT_PREVIEW_CHARS: usize = 100;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref BLOCKLIST: Vec<(&'static str, Regex)> = [
        ("ATTACH", r"(?i)\bATTACH\b"),
        ("DETACH", r"(?i)\bDETACH\b"),
        ("PRAGMA", r"(?i)\bPRAGMA\b"),
        (
            "CREATE TABLE",
            r"(?i)\bCREATE\s+(?:TEMP\s+|TEMPORARY\s+|VIRTUAL\s+)?TABLE\b"
        ),
        ("CREATE TRIGGER", r"(?i)\bCREATE\s+(?:TEMP\s+|TEMPORARY\s+)?TRIGGER\b"),
        ("CREATE VIEW", r"(?i)\bCREATE\s+(?:TEMP\s+|TEMPORARY\s+)?VIEW\b"),
        ("CREATE INDEX", r"(?i)\bCREATE\s+(?:UNIQUE\s+)?INDEX\b"),
        ("DROP", r"(?i)\bDROP\b"),
        ("ALTER", r"(?i)\bALTER\b"),
        ("TRUNCATE", r"(?i)\bTRUNCATE\b"),
        ("VACUUM", r"(?i)\bVACUUM\b"),
        ("ANALYZE", r"(?i)\bANALYZE\b"),
        ("EXPLAIN QUERY PLAN", r"(?i)\bEXPLAIN\s+QUERY\s+PLAN\b"),
        (".read", r"(?i)(?:^|\s)\.read\b"),
        (".import", r"(?i)(?:^|\s)\.import\b"),
        (".output", r"(?i)(?:^|\s)\.output\b"),
        (".dump", r"(?i)(?:^|\s)\.dump\b"),
    ]
    .into_iter()
    .map(|(keyword, pattern)| (keyword, Regex::new(pattern).expect("valid regex")))
    .collect();
}

/// Split on `;`, trimming and collapsing whitespace; empty pieces are dropped
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|part| WHITESPACE.replace_all(part.trim(), " ").into_owned())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

/// Reject statements that touch schema, attach files or inspect the engine
pub fn check_statement(statement: &str) -> Result<(), SqlRejection> {
    match BLOCKLIST.iter().find(|(_, re)| re.is_match(statement)) {
        Some((keyword, _)) => Err(SqlRejection {
            keyword: keyword.to_string(),
        }),
        None => Ok(()),
    }
}

/// Runs SQL against a throwaway in-memory database
#[derive(Debug, Clone)]
pub struct SqlRunner {
    budget: Duration,
}

impl SqlRunner {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    /// Run setup then user statements; stdout is a JSON array of per-statement records
    #[tracing::instrument(skip_all, fields(has_setup = setup.is_some()))]
    pub async fn run(&self, setup: Option<&str>, user_sql: &str) -> ExecutionResult {
        let start = Instant::now();

        let user_statements = split_statements(user_sql);
        if user_statements.is_empty() {
            let stdout = render(&[json!({ "error": "No SQL statements found" })]);
            return ExecutionResult {
                stdout,
                stderr: String::new(),
                exit_code: 1,
                duration_seconds: 0.0,
                failure_kind: FailureKind::RuntimeError,
            };
        }
        let setup_statements = setup.map(split_statements).unwrap_or_default();

        let conn = match Connection::open_in_memory() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Failed to open in-memory database");
                return ExecutionResult::failure(
                    FailureKind::RuntimeError,
                    format!("Execution error: {}", e),
                    1,
                );
            }
        };
        let interrupt = conn.get_interrupt_handle();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = tokio::task::spawn_blocking(move || {
            execute_all(&conn, &setup_statements, &user_statements, &flag)
        });

        let result = match tokio::time::timeout(self.budget, task).await {
            Ok(Ok((records, warnings))) => {
                info!(
                    statements = records.len(),
                    setup_warnings = warnings.len(),
                    "SQL execution completed"
                );
                ExecutionResult {
                    stdout: render(&records),
                    stderr: warnings.join("\n"),
                    exit_code: 0,
                    duration_seconds: 0.0,
                    failure_kind: FailureKind::None,
                }
            }
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "SQL execution task failed");
                ExecutionResult::failure(
                    FailureKind::RuntimeError,
                    format!("Execution error: {}", join_err),
                    1,
                )
            }
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                interrupt.interrupt();
                warn!(timeout_ms = self.budget.as_millis() as u64, "SQL execution timed out");
                ExecutionResult::failure(
                    FailureKind::Timeout,
                    format!(
                        "Execution timeout ({} seconds exceeded). Your query took too long to execute.",
                        self.budget.as_secs()
                    ),
                    TIMEOUT_EXIT_CODE,
                )
            }
        };

        result.with_duration(start.elapsed().as_secs_f64())
    }
}

fn execute_all(
    conn: &Connection,
    setup: &[String],
    user: &[String],
    cancelled: &AtomicBool,
) -> (Vec<Value>, Vec<String>) {
    let mut warnings = Vec::new();
    for stmt in setup {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = conn.execute_batch(stmt) {
            warn!(error = %e, "Setup statement failed");
            warnings.push(format!("Setup warning: {}", e));
        }
    }

    let mut records = Vec::with_capacity(user.len());
    for stmt in user {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let record = match check_statement(stmt) {
            Err(rejection) => {
                debug!(keyword = %rejection.keyword, "Rejected unsafe statement");
                error_record(&rejection.to_string(), stmt)
            }
            Ok(()) => match execute_one(conn, stmt) {
                Ok(record) => record,
                Err(e) => error_record(&e.to_string(), stmt),
            },
        };
        records.push(record);
    }
    (records, warnings)
}

/// Statements with result columns report rows, everything else reports a row count
fn execute_one(conn: &Connection, sql: &str) -> rusqlite::Result<Value> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();

    if column_count == 0 {
        let rows_affected = stmt.execute([])?;
        return Ok(json!({
            "message": "Statement executed successfully",
            "rows_affected": rows_affected,
        }));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query([])?;
    let mut out: Vec<Value> = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            cells.push(cell_value(row.get_ref(idx)?));
        }
        out.push(Value::Array(cells));
    }

    let mut record = Map::new();
    record.insert("columns".to_string(), json!(columns));
    record.insert("row_count".to_string(), json!(out.len()));
    record.insert("rows".to_string(), Value::Array(out));
    Ok(Value::Object(record))
}

fn cell_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

fn error_record(message: &str, statement: &str) -> Value {
    let preview: String = statement.chars().take(STATEMENT_PREVIEW_CHARS).collect();
    json!({ "error": message, "statement": preview })
}

fn render(records: &[Value]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
}
