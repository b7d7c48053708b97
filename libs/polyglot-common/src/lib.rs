pub mod config;
pub mod types;

// Re-export commonly used types for convenience
pub use config::Config;
pub use types::{
    EvaluationRequest, ExecutionRequest, ExecutionResult, FailureKind, Language, MatchReason,
    RunRequest, RunResponse, TestCase, TestCaseResult, Verdict,
};
