pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod judge;
pub mod literal;
pub mod remote;
pub mod sql;
pub mod toolchain;
pub mod verdict;
pub mod workspace;

// Re-export the entry points used by the binaries
pub use config::{LanguageConfig, LanguageConfigManager};
pub use error::{EngineError, JudgeError, RemoteError, SqlRejection};
pub use evaluator::{compare, normalize};
pub use executor::SubmissionExecutor;
pub use judge::{DisabledJudge, Judge, Judgement, JudgementPrompt, OpenAiJudge};
pub use toolchain::{Resolution, Toolchain, ToolchainResolver, ToolchainStatus};
pub use verdict::{ExecutionSummary, VerdictEngine, VerdictPolicy};
