//! Remote fallback client
//!
//! Sends a submission to a Piston-compatible execution service when the local
//! host lacks the compiler. Every failure mode (unreachable, timeout, bad
//! status, undecodable body) comes back as an `ExecutionResult`.

use crate::config::LanguageConfigManager;
use crate::engine::TIMEOUT_EXIT_CODE;
use crate::error::RemoteError;
use crate::workspace::java_type_name;
use polyglot_common::types::{ExecutionResult, FailureKind, Language};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct PistonFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    content: String,
}

#[derive(Debug, Serialize)]
struct PistonRequest {
    language: String,
    version: &'static str,
    files: Vec<PistonFile>,
    stdin: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PistonStage {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PistonResponse {
    #[serde(default)]
    pub run: PistonStage,
    #[serde(default)]
    pub compile: Option<PistonStage>,
    /// Set by the service when it rejects the request itself
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
    languages: LanguageConfigManager,
}

impl RemoteClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        languages: LanguageConfigManager,
    ) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client, using defaults");
                Client::new()
            });
        Self {
            http,
            endpoint: endpoint.into(),
            timeout,
            languages,
        }
    }

    /// Execute remotely; never returns an error
    #[tracing::instrument(skip(self, source, stdin), fields(language = %language))]
    pub async fn run_remote(&self, source: &str, language: Language, stdin: &str) -> ExecutionResult {
        let start = Instant::now();

        let Some(remote_language) = self.languages.get_config(language).remote_language.clone() else {
            return ExecutionResult::failure(
                FailureKind::RemoteServiceError,
                format!("Language {} not supported by the remote execution service", language),
                1,
            );
        };

        info!(endpoint = %self.endpoint, "Executing via remote service");
        let outcome = self.send(remote_language, source, language, stdin).await;

        let result = match outcome {
            Ok(response) => map_response(response),
            Err(err) => {
                warn!(error = %err, "Remote execution failed");
                map_error(err, self.timeout)
            }
        };
        result.with_duration(start.elapsed().as_secs_f64())
    }

    async fn send(
        &self,
        remote_language: String,
        source: &str,
        language: Language,
        stdin: &str,
    ) -> Result<PistonResponse, RemoteError> {
        // Java on Piston needs the file named after its public class
        let name = match language {
            Language::Java => java_type_name(source).map(|class| format!("{}.java", class)),
            _ => None,
        };
        let payload = PistonRequest {
            language: remote_language,
            version: "*",
            files: vec![PistonFile {
                name,
                content: source.to_string(),
            }],
            stdin: stdin.to_string(),
        };

        let response = self.http.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!(body_size = body.len(), "Remote response received");
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Translate the service's compile/run stages into an ExecutionResult
pub fn map_response(response: PistonResponse) -> ExecutionResult {
    if let Some(message) = response.message.filter(|m| !m.is_empty()) {
        return ExecutionResult::failure(
            FailureKind::RemoteServiceError,
            format!("Code execution service error: {}", message),
            1,
        );
    }

    if let Some(compile) = response.compile {
        let failed = !compile.stderr.trim().is_empty() || compile.code.is_some_and(|c| c != 0);
        if failed {
            let details = if compile.stderr.trim().is_empty() {
                "Compilation error".to_string()
            } else {
                compile.stderr
            };
            return ExecutionResult::failure(
                FailureKind::CompileError,
                details,
                compile.code.filter(|&c| c != 0).unwrap_or(1),
            );
        }
    }

    let run = response.run;
    if run.signal.as_deref() == Some("SIGKILL") {
        return ExecutionResult {
            stdout: String::new(),
            stderr: "Code execution timeout. Please try again or simplify your code.".to_string(),
            exit_code: TIMEOUT_EXIT_CODE,
            duration_seconds: 0.0,
            failure_kind: FailureKind::Timeout,
        };
    }

    let exit_code = run.code.unwrap_or(if run.signal.is_some() { 1 } else { 0 });
    ExecutionResult {
        stdout: run.stdout,
        stderr: run.stderr,
        exit_code,
        duration_seconds: 0.0,
        failure_kind: if exit_code == 0 {
            FailureKind::None
        } else {
            FailureKind::RuntimeError
        },
    }
}

fn map_error(err: RemoteError, timeout: Duration) -> ExecutionResult {
    match err {
        RemoteError::Timeout => ExecutionResult::failure(
            FailureKind::Timeout,
            format!(
                "Code execution timeout ({} seconds). Please try again or simplify your code.",
                timeout.as_secs()
            ),
            TIMEOUT_EXIT_CODE,
        ),
        RemoteError::Status(code) => ExecutionResult::failure(
            FailureKind::RemoteServiceError,
            format!(
                "Code execution service unavailable (HTTP {}). Please try again later.",
                code
            ),
            1,
        ),
        other => ExecutionResult::failure(
            FailureKind::RemoteServiceError,
            format!("Code execution service error: {}", other),
            1,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PistonResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_successful_run() {
        let result = map_response(parse(
            r#"{"language":"cpp","version":"10.2.0",
                "compile":{"stdout":"","stderr":"","code":0,"signal":null},
                "run":{"stdout":"5\n","stderr":"","code":0,"signal":null}}"#,
        ));
        assert_eq!(result.failure_kind, FailureKind::None);
        assert_eq!(result.stdout, "5\n");
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_compile_error_wins() {
        let result = map_response(parse(
            r#"{"compile":{"stdout":"","stderr":"main.c:1: error","code":1},
                "run":{"stdout":"","stderr":"","code":null}}"#,
        ));
        assert_eq!(result.failure_kind, FailureKind::CompileError);
        assert!(result.stderr.contains("main.c:1"));
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_killed_run_is_timeout() {
        let result = map_response(parse(
            r#"{"run":{"stdout":"partial","stderr":"","code":null,"signal":"SIGKILL"}}"#,
        ));
        assert_eq!(result.failure_kind, FailureKind::Timeout);
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_nonzero_run_is_runtime_error() {
        let result = map_response(parse(
            r#"{"run":{"stdout":"","stderr":"Exception in thread main","code":1}}"#,
        ));
        assert_eq!(result.failure_kind, FailureKind::RuntimeError);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_service_message_is_remote_error() {
        let result = map_response(parse(r#"{"message":"cobol is not a known runtime"}"#));
        assert_eq!(result.failure_kind, FailureKind::RemoteServiceError);
    }

    #[test]
    fn test_status_error_mapping() {
        let result = map_error(RemoteError::Status(503), Duration::from_secs(10));
        assert_eq!(result.failure_kind, FailureKind::RemoteServiceError);
        assert!(result.stderr.contains("503"));
        let result = map_error(RemoteError::Timeout, Duration::from_secs(10));
        assert_eq!(result.failure_kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_unreachable_service_never_errors() {
        let client = RemoteClient::new(
            "http://127.0.0.1:1/api/v2/piston/execute",
            Duration::from_secs(2),
            LanguageConfigManager::builtin(),
        );
        let result = client.run_remote("int main(){}", Language::C, "").await;
        assert!(!result.is_success());
        assert!(matches!(
            result.failure_kind,
            FailureKind::RemoteServiceError | FailureKind::Timeout
        ));
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_sql_has_no_remote_runtime() {
        let client = RemoteClient::new(
            "http://127.0.0.1:1",
            Duration::from_secs(1),
            LanguageConfigManager::builtin(),
        );
        let result = client.run_remote("SELECT 1", Language::Sql, "").await;
        assert_eq!(result.failure_kind, FailureKind::RemoteServiceError);
    }

    #[tokio::test]
    #[ignore = "requires network access to the public Piston service"]
    async fn test_public_service_runs_c() {
        let client = RemoteClient::new(
            "https://emkc.org/api/v2/piston/execute",
            Duration::from_secs(10),
            LanguageConfigManager::builtin(),
        );
        let result = client
            .run_remote(
                "#include <stdio.h>\nint main(){int a,b;scanf(\"%d %d\",&a,&b);printf(\"%d\\n\",a+b);}",
                Language::C,
                "2 3",
            )
            .await;
        assert_eq!(result.stdout.trim(), "5");
    }
}
