/// Submission Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Coordinate toolchain resolution, execution, evaluation and judgement.
///
/// **Architecture:**
/// 1. Resolve a toolchain (toolchain.rs), or route SQL to the embedded runner (sql.rs)
/// 2. Run locally in a fresh workspace (engine.rs), or remotely when a compiler is missing (remote.rs)
/// 3. Compare outputs per test case (evaluator.rs)
/// 4. Merge test evidence with the holistic judgement (verdict.rs)
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (engine's job)
/// - How outputs compare (evaluator's job)
/// - How scores are decided (verdict engine's job)
use crate::config::LanguageConfigManager;
use crate::engine::{toolchain_missing_message, ProcessExecutor, NOT_FOUND_EXIT_CODE};
use crate::error::EngineError;
use crate::evaluator::{evaluate_test, summary_line};
use crate::harness;
use crate::judge::{DisabledJudge, Judge, OpenAiJudge};
use crate::remote::RemoteClient;
use crate::sql::SqlRunner;
use crate::toolchain::{Resolution, ToolchainResolver, ToolchainStatus};
use crate::verdict::{ExecutionSummary, SubmissionContext, VerdictEngine, VerdictPolicy};
use crate::workspace::Workspace;
use polyglot_common::types::{
    EvaluationRequest, ExecutionRequest, ExecutionResult, FailureKind, Language,
    MatchReason, RunRequest, RunResponse, TestCaseResult, Verdict,
};
use polyglot_common::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest accepted source file
pub const MAX_SOURCE_BYTES: usize = 1024 * 1024;
/// Largest accepted stdin
pub const MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

pub struct SubmissionExecutor {
    resolver: ToolchainResolver,
    process: ProcessExecutor,
    sql: SqlRunner,
    remote: Option<RemoteClient>,
    verdicts: VerdictEngine,
}

impl SubmissionExecutor {
    /// Build every component from application configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let languages = LanguageConfigManager::load_or_builtin(&config.languages_file)?;
        info!(languages = ?languages.list_languages(), "Language table ready");

        let judge: Arc<dyn Judge> = match &config.judge_api_key {
            Some(key) => Arc::new(OpenAiJudge::new(
                key.clone(),
                config.judge_api_base.clone(),
                config.judge_models.clone(),
                Duration::from_secs(config.judge_timeout_secs),
            )),
            None => {
                warn!("JUDGE_API_KEY not set, verdicts will be rule-based");
                Arc::new(DisabledJudge)
            }
        };

        let remote = config.remote_enabled.then(|| {
            RemoteClient::new(
                config.remote_url.clone(),
                Duration::from_secs(config.remote_timeout_secs),
                languages.clone(),
            )
        });

        Ok(Self {
            process: ProcessExecutor::new(
                Duration::from_secs(config.interpreted_timeout_secs),
                Duration::from_secs(config.compiled_timeout_secs),
            ),
            sql: SqlRunner::new(Duration::from_secs(config.interpreted_timeout_secs)),
            resolver: ToolchainResolver::new(config.venv_dir.clone(), languages),
            remote,
            verdicts: VerdictEngine::new(
                VerdictPolicy::with_threshold(config.pass_threshold),
                judge,
            ),
        })
    }

    /// Replace the judgement service
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        let policy = *self.verdicts.policy();
        self.verdicts = VerdictEngine::new(policy, judge);
        self
    }

    pub fn toolchains(&self) -> Vec<ToolchainStatus> {
        self.resolver.report()
    }

    /// Execute one request
    ///
    /// Only malformed requests and a broken host are errors; everything that
    /// goes wrong while running the code is described by the result.
    #[tracing::instrument(skip_all, fields(language = %request.language))]
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        validate(&request.source, &request.stdin)?;

        if request.language == Language::Sql {
            return Ok(self
                .sql
                .run(request.sql_setup.as_deref(), &request.source)
                .await);
        }

        match self.resolver.resolve(request.language) {
            Resolution::Process(toolchain) => {
                let config = self.resolver.languages().get_config(request.language);
                let workspace = Workspace::acquire(request.language, config, &request.source)?;
                let result = self
                    .process
                    .run(request.language, &workspace, &toolchain, &request.stdin)
                    .await;
                workspace.release();
                Ok(result)
            }
            Resolution::Missing { tool } if request.language.is_compiled() => match &self.remote {
                Some(remote) => {
                    info!(tool = %tool, "Local toolchain missing, falling back to remote execution");
                    Ok(remote
                        .run_remote(&request.source, request.language, &request.stdin)
                        .await)
                }
                None => Ok(missing(request.language, &tool)),
            },
            Resolution::Missing { tool } => Ok(missing(request.language, &tool)),
            Resolution::Embedded => Ok(self
                .sql
                .run(request.sql_setup.as_deref(), &request.source)
                .await),
        }
    }

    /// Wire-level single run
    pub async fn run_wire(&self, request: RunRequest) -> Result<RunResponse, EngineError> {
        let language = parse_language(&request.language)?;
        let execution = ExecutionRequest::new(language, request.code, request.input)
            .with_sql_setup(request.sql_setup);
        let result = self.run(&execution).await?;
        Ok(RunResponse::from(&result))
    }

    /// Run the baseline and every test case, then reach a verdict
    #[tracing::instrument(skip_all, fields(language = %request.language, tests = tracing::field::Empty))]
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Verdict, EngineError> {
        let language = parse_language(&request.language)?;
        validate(&request.code, "")?;

        let test_cases = request.effective_test_cases();
        tracing::Span::current().record("tests", test_cases.len());
        let sql_setup = match language {
            Language::Sql => request.sql_setup.clone(),
            _ => None,
        };

        let baseline_request = ExecutionRequest::new(language, request.code.clone(), "")
            .with_sql_setup(sql_setup.clone());
        let baseline = self.run(&baseline_request).await?;

        let mut summary = ExecutionSummary::default();
        describe_baseline(&mut summary, &baseline);

        let mut results = Vec::with_capacity(test_cases.len());
        for (i, case) in test_cases.iter().enumerate() {
            let result = if baseline.failure_kind == FailureKind::CompileError {
                // the same source cannot compile on a second attempt
                evaluate_test(&baseline, case)
            } else {
                let source = match language {
                    Language::Python => harness::synthesize(&request.code, &case.input),
                    _ => request.code.clone(),
                };
                let test_request = ExecutionRequest::new(language, source, case.input.clone())
                    .with_sql_setup(sql_setup.clone());
                match self.run(&test_request).await {
                    Ok(execution) => evaluate_test(&execution, case),
                    Err(e) => {
                        warn!(test = i + 1, error = %e, "Test case could not run");
                        TestCaseResult {
                            test_case: case.clone(),
                            actual_output: format!("Error: {}", e),
                            passed: false,
                            match_reason: MatchReason::None,
                        }
                    }
                }
            };
            debug!(test = i + 1, passed = result.passed, "Test case evaluated");
            summary.push(summary_line(i + 1, &result));
            results.push(result);
        }

        let context = SubmissionContext {
            question: request.question_text.clone(),
            language: language.to_string(),
            code: request.code.clone(),
            difficulty: request.difficulty.clone(),
        };
        summary.baseline = Some(baseline);
        Ok(self.verdicts.judge(&context, &summary, results).await)
    }
}

fn parse_language(name: &str) -> Result<Language, EngineError> {
    Language::from_str(name).ok_or_else(|| EngineError::UnsupportedLanguage(name.to_string()))
}

fn validate(source: &str, stdin: &str) -> Result<(), EngineError> {
    if source.trim().is_empty() {
        return Err(EngineError::EmptySource);
    }
    if source.len() > MAX_SOURCE_BYTES {
        return Err(EngineError::SourceTooLarge {
            limit: MAX_SOURCE_BYTES,
        });
    }
    if stdin.len() > MAX_INPUT_BYTES {
        return Err(EngineError::InputTooLarge {
            limit: MAX_INPUT_BYTES,
        });
    }
    Ok(())
}

fn missing(language: Language, tool: &str) -> ExecutionResult {
    warn!(language = %language, tool = %tool, "Toolchain missing and no fallback available");
    ExecutionResult::failure(
        FailureKind::ToolchainMissing,
        toolchain_missing_message(language),
        NOT_FOUND_EXIT_CODE,
    )
}

fn describe_baseline(summary: &mut ExecutionSummary, baseline: &ExecutionResult) {
    match baseline.failure_kind {
        FailureKind::None if baseline.stdout.trim().is_empty() => {
            summary.push("No output (code defines functions/classes)")
        }
        FailureKind::None => summary.push(format!("Output: {}", baseline.stdout.trim())),
        FailureKind::ToolchainMissing | FailureKind::RemoteServiceError => {
            summary.push(format!("Error: {}", baseline.stderr.trim()));
            summary.push("Note: Code execution unavailable, using AI-based analysis");
        }
        _ => summary.push(format!("Error: {}", baseline.stderr.trim())),
    }
}
