//! Toolchain resolution
//!
//! Locates the interpreter or compiler a language needs on the local host.
//! Resolution is a pure lookup: nothing is installed and nothing is cached
//! behind the caller's back. A missing toolchain is a normal outcome, not an
//! error; callers decide whether to fall back to remote execution.

use crate::config::{LanguageConfig, LanguageConfigManager};
use polyglot_common::types::Language;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use which::which;

/// A locally invocable toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toolchain {
    /// Runs the source file directly (Python, JavaScript)
    Interpreter { program: PathBuf },
    /// `javac` then `java -cp`
    Jvm { javac: PathBuf, java: PathBuf },
    /// `gcc`/`g++` producing a native executable
    Native { compiler: PathBuf },
}

/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Process(Toolchain),
    /// Executed in-process (SQL on the embedded database)
    Embedded,
    /// Nothing usable on this host; `tool` names what was looked for
    Missing { tool: String },
}

/// One row of the toolchain report
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainStatus {
    pub language: Language,
    pub status: &'static str,
    pub path: Option<PathBuf>,
    pub remote_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct ToolchainResolver {
    venv_dir: PathBuf,
    languages: LanguageConfigManager,
}

impl ToolchainResolver {
    pub fn new(venv_dir: impl Into<PathBuf>, languages: LanguageConfigManager) -> Self {
        Self {
            venv_dir: venv_dir.into(),
            languages,
        }
    }

    pub fn languages(&self) -> &LanguageConfigManager {
        &self.languages
    }

    /// Resolve the toolchain for a language
    pub fn resolve(&self, language: Language) -> Resolution {
        let config = self.languages.get_config(language);

        let resolution = match language {
            Language::Python => self
                .bundled_python()
                .or_else(|| find_first(&config.runtimes))
                .map(|program| Resolution::Process(Toolchain::Interpreter { program }))
                .unwrap_or_else(|| missing(config, &config.runtimes)),
            Language::JavaScript => find_first(&config.runtimes)
                .map(|program| Resolution::Process(Toolchain::Interpreter { program }))
                .unwrap_or_else(|| missing(config, &config.runtimes)),
            Language::Java => match (find_first(&config.compilers), find_first(&config.runtimes)) {
                (Some(javac), Some(java)) => Resolution::Process(Toolchain::Jvm { javac, java }),
                (None, _) => missing(config, &config.compilers),
                (_, None) => missing(config, &config.runtimes),
            },
            Language::C | Language::Cpp => find_first(&config.compilers)
                .map(|compiler| Resolution::Process(Toolchain::Native { compiler }))
                .unwrap_or_else(|| missing(config, &config.compilers)),
            Language::Sql => Resolution::Embedded,
        };

        debug!(language = %language, resolution = ?resolution, "Resolved toolchain");
        resolution
    }

    /// Interpreter of the virtual environment bundled with the service
    fn bundled_python(&self) -> Option<PathBuf> {
        let candidate = if cfg!(windows) {
            self.venv_dir.join("Scripts").join("python.exe")
        } else {
            self.venv_dir.join("bin").join("python")
        };
        is_executable(&candidate).then_some(candidate)
    }

    /// Resolution status of every language, for diagnostics
    pub fn report(&self) -> Vec<ToolchainStatus> {
        Language::all_variants()
            .iter()
            .map(|&language| {
                let (status, path) = match self.resolve(language) {
                    Resolution::Process(Toolchain::Interpreter { program }) => ("local", Some(program)),
                    Resolution::Process(Toolchain::Jvm { javac, .. }) => ("local", Some(javac)),
                    Resolution::Process(Toolchain::Native { compiler }) => ("local", Some(compiler)),
                    Resolution::Embedded => ("embedded", None),
                    Resolution::Missing { .. } => ("missing", None),
                };
                ToolchainStatus {
                    language,
                    status,
                    path,
                    remote_fallback: language.is_compiled(),
                }
            })
            .collect()
    }
}

fn find_first(candidates: &[String]) -> Option<PathBuf> {
    candidates.iter().find_map(|name| which(name).ok())
}

fn missing(config: &LanguageConfig, candidates: &[String]) -> Resolution {
    Resolution::Missing {
        tool: candidates
            .first()
            .cloned()
            .unwrap_or_else(|| config.name.clone()),
    }
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(json: &str) -> ToolchainResolver {
        let languages = LanguageConfigManager::from_json(json).unwrap();
        ToolchainResolver::new("no-such-venv", languages)
    }

    #[test]
    fn test_sql_is_embedded() {
        let resolver = ToolchainResolver::new("venv", LanguageConfigManager::builtin());
        assert_eq!(resolver.resolve(Language::Sql), Resolution::Embedded);
    }

    #[test]
    fn test_missing_compiler_is_reported_not_raised() {
        let resolver = resolver_with(
            r#"{"languages": [{"name": "c", "file_extension": "c",
                "compilers": ["definitely-not-a-real-compiler-xyz"]}]}"#,
        );
        assert_eq!(
            resolver.resolve(Language::C),
            Resolution::Missing {
                tool: "definitely-not-a-real-compiler-xyz".to_string()
            }
        );
    }

    #[test]
    fn test_java_needs_both_tools() {
        let resolver = resolver_with(
            r#"{"languages": [{"name": "java", "file_extension": "java",
                "compilers": ["no-javac-here-xyz"], "runtimes": ["no-java-here-xyz"]}]}"#,
        );
        assert_eq!(
            resolver.resolve(Language::Java),
            Resolution::Missing {
                tool: "no-javac-here-xyz".to_string()
            }
        );
    }

    #[test]
    fn test_bundled_python_preferred() {
        let venv = tempfile::tempdir().unwrap();
        let bin = if cfg!(windows) {
            venv.path().join("Scripts")
        } else {
            venv.path().join("bin")
        };
        std::fs::create_dir_all(&bin).unwrap();
        let python = if cfg!(windows) {
            bin.join("python.exe")
        } else {
            bin.join("python")
        };
        std::fs::write(&python, "").unwrap();

        let resolver = ToolchainResolver::new(venv.path(), LanguageConfigManager::builtin());
        assert_eq!(
            resolver.resolve(Language::Python),
            Resolution::Process(Toolchain::Interpreter { program: python })
        );
    }

    #[test]
    fn test_report_lists_every_language() {
        let resolver = ToolchainResolver::new("venv", LanguageConfigManager::builtin());
        let report = resolver.report();
        assert_eq!(report.len(), Language::all_variants().len());
        let sql = report.iter().find(|s| s.language == Language::Sql).unwrap();
        assert_eq!(sql.status, "embedded");
        assert!(!sql.remote_fallback);
    }
}
