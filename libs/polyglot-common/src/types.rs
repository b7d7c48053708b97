use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of languages the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    #[serde(alias = "js")]
    JavaScript,
    C,
    #[serde(alias = "c++")]
    Cpp,
    Sql,
}

/// Timeout budget class a language belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetClass {
    /// Interpreted and SQL runs: longer budget, covers library cold-start
    Interpreted,
    /// Compiled languages: shorter budget, applied to compile and to run
    Compiled,
}

impl Language {
    /// Returns all language variants
    /// This is the single source of truth for available languages
    pub fn all_variants() -> &'static [Language] {
        &[
            Language::Python,
            Language::Java,
            Language::JavaScript,
            Language::C,
            Language::Cpp,
            Language::Sql,
        ]
    }

    /// Parse a language from string (case-insensitive, accepts aliases)
    pub fn from_str(s: &str) -> Option<Language> {
        match s.trim().to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "java" => Some(Language::Java),
            "javascript" | "js" => Some(Language::JavaScript),
            "c" => Some(Language::C),
            "cpp" | "c++" => Some(Language::Cpp),
            "sql" => Some(Language::Sql),
            _ => None,
        }
    }

    /// Languages that need a compile step before running
    pub fn is_compiled(&self) -> bool {
        matches!(self, Language::Java | Language::C | Language::Cpp)
    }

    pub fn budget_class(&self) -> BudgetClass {
        match self {
            Language::Python | Language::Sql => BudgetClass::Interpreted,
            Language::Java | Language::JavaScript | Language::C | Language::Cpp => {
                BudgetClass::Compiled
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::Java => write!(f, "java"),
            Language::JavaScript => write!(f, "javascript"),
            Language::C => write!(f, "c"),
            Language::Cpp => write!(f, "cpp"),
            Language::Sql => write!(f, "sql"),
        }
    }
}

/// Why a run did not complete normally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[default]
    None,
    CompileError,
    RuntimeError,
    Timeout,
    ToolchainMissing,
    ModuleMissing,
    /// The remote execution service could not be reached or answered badly
    RemoteServiceError,
}

/// One execution of one submission against one stdin (immutable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: Language,
    #[serde(default)]
    pub stdin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_setup: Option<String>,
}

impl ExecutionRequest {
    pub fn new(language: Language, source: impl Into<String>, stdin: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language,
            stdin: stdin.into(),
            sql_setup: None,
        }
    }

    pub fn with_sql_setup(mut self, setup: Option<String>) -> Self {
        self.sql_setup = setup.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Raw outcome of a run
/// Produced exactly once per ExecutionRequest and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_seconds: f64,
    pub failure_kind: FailureKind,
}

impl ExecutionResult {
    /// A result with no usable stdout
    pub fn failure(kind: FailureKind, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            duration_seconds: 0.0,
            failure_kind: kind,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure_kind == FailureKind::None
    }
}

/// Wire shape of a single ad-hoc run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub sql_setup: Option<String>,
}

fn default_language() -> String {
    "python".to_string()
}

/// Wire shape returned for a single ad-hoc run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub output: String,
    pub error: String,
    pub execution_time: f64,
    pub exit_code: i32,
    pub failure_kind: FailureKind,
}

impl From<&ExecutionResult> for RunResponse {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            output: result.stdout.clone(),
            error: if result.is_success() {
                String::new()
            } else {
                result.stderr.clone()
            },
            execution_time: (result.duration_seconds * 1000.0).round() / 1000.0,
            exit_code: result.exit_code,
            failure_kind: result.failure_kind,
        }
    }
}

/// Test case as it arrives on the wire: input and output may be any literal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseInput {
    #[serde(default)]
    pub input: Value,
    #[serde(default, alias = "expected_output")]
    pub output: Value,
}

impl TestCaseInput {
    pub fn to_test_case(&self) -> TestCase {
        TestCase {
            input: stringify_literal(&self.input),
            expected_output: stringify_literal(&self.output).trim().to_string(),
        }
    }
}

/// Strings pass through verbatim, every other literal becomes its JSON text
fn stringify_literal(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Test Case Definition (Immutable Input)
/// Ordering matters - execution is sequential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Which equivalence check accepted the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Exact,
    Numeric,
    Structured,
    None,
}

/// Per-test outcome, one per TestCase, order preserved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case: TestCase,
    pub actual_output: String,
    pub passed: bool,
    pub match_reason: MatchReason,
}

/// Wire shape of a full evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub question_text: String,
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCaseInput>,
    /// Used as test cases when `test_cases` is empty
    #[serde(default)]
    pub examples: Vec<TestCaseInput>,
    #[serde(default)]
    pub sql_setup: Option<String>,
}

impl EvaluationRequest {
    /// Test cases to run, falling back to the examples
    pub fn effective_test_cases(&self) -> Vec<TestCase> {
        let source = if self.test_cases.is_empty() {
            &self.examples
        } else {
            &self.test_cases
        };
        source.iter().map(TestCaseInput::to_test_case).collect()
    }
}

/// Final correctness/score verdict for one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub correctness: bool,
    pub score: u32,
    pub feedback: String,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
    pub canonical_solution: String,
    pub execution_summary: String,
    #[serde(default)]
    pub execution_output: String,
    #[serde(default)]
    pub execution_time_seconds: Option<f64>,
    #[serde(default)]
    pub time_complexity: String,
    #[serde(default)]
    pub space_complexity: String,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub motivation_message: String,
    #[serde(default)]
    pub test_results: Vec<TestCaseResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_serialization() {
        let json = serde_json::to_string(&Language::Cpp).unwrap();
        assert_eq!(json, "\"cpp\"");

        let deserialized: Language = serde_json::from_str("\"c++\"").unwrap();
        assert_eq!(deserialized, Language::Cpp);
        let deserialized: Language = serde_json::from_str("\"js\"").unwrap();
        assert_eq!(deserialized, Language::JavaScript);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!(Language::from_str("Python"), Some(Language::Python));
        assert_eq!(Language::from_str("JS"), Some(Language::JavaScript));
        assert_eq!(Language::from_str("c++"), Some(Language::Cpp));
        assert_eq!(Language::from_str(" sql "), Some(Language::Sql));
        assert_eq!(Language::from_str("rust"), None);
        assert_eq!(Language::from_str(""), None);
    }

    #[test]
    fn test_language_display_round_trips() {
        for lang in Language::all_variants() {
            assert_eq!(Language::from_str(&lang.to_string()), Some(*lang));
        }
    }

    #[test]
    fn test_budget_classes() {
        assert_eq!(Language::Python.budget_class(), BudgetClass::Interpreted);
        assert_eq!(Language::Sql.budget_class(), BudgetClass::Interpreted);
        assert_eq!(Language::Java.budget_class(), BudgetClass::Compiled);
        assert_eq!(Language::JavaScript.budget_class(), BudgetClass::Compiled);
        assert!(Language::Cpp.is_compiled());
        assert!(!Language::JavaScript.is_compiled());
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::ToolchainMissing).unwrap();
        assert_eq!(json, "\"toolchain_missing\"");
    }

    #[test]
    fn test_test_case_input_stringification() {
        let tc: TestCaseInput =
            serde_json::from_str(r#"{"input": [2, 3], "output": 5}"#).unwrap();
        let case = tc.to_test_case();
        assert_eq!(case.input, "[2,3]");
        assert_eq!(case.expected_output, "5");

        let tc: TestCaseInput =
            serde_json::from_str(r#"{"input": "hello\n", "output": "  olleh \n"}"#).unwrap();
        let case = tc.to_test_case();
        assert_eq!(case.input, "hello\n");
        assert_eq!(case.expected_output, "olleh");
    }

    #[test]
    fn test_examples_used_when_no_test_cases() {
        let req: EvaluationRequest = serde_json::from_str(
            r#"{"code": "print(1)", "language": "python",
                "examples": [{"input": "", "output": "1"}]}"#,
        )
        .unwrap();
        let cases = req.effective_test_cases();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].expected_output, "1");
    }

    #[test]
    fn test_run_response_hides_stderr_on_success() {
        let result = ExecutionResult {
            stdout: "5\n".to_string(),
            stderr: "warning".to_string(),
            exit_code: 0,
            duration_seconds: 0.12345,
            failure_kind: FailureKind::None,
        };
        let response = RunResponse::from(&result);
        assert_eq!(response.output, "5\n");
        assert!(response.error.is_empty());
        assert_eq!(response.execution_time, 0.123);

        let failed = ExecutionResult::failure(FailureKind::Timeout, "too slow", 124);
        let response = RunResponse::from(&failed);
        assert_eq!(response.error, "too slow");
        assert_eq!(response.exit_code, 124);
    }
}
