// CLI commands for running and evaluating submissions
use anyhow::{bail, Context, Result};
use polyglot_common::types::{EvaluationRequest, RunRequest, Verdict};
use polyglot_common::Config;
use polyglot_engine::{LanguageConfigManager, SubmissionExecutor};
use std::fs;
use std::path::Path;

fn executor() -> Result<SubmissionExecutor> {
    SubmissionExecutor::from_config(&Config::from_env())
        .context("Failed to initialize execution engine")
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Build the wire request for a single run
fn build_run_request(
    lang: &str,
    file: &Path,
    input: Option<String>,
    input_file: Option<&Path>,
    sql_setup: Option<&Path>,
) -> Result<RunRequest> {
    let code = read_file(file)?;
    let input = match (input, input_file) {
        (Some(text), _) => text,
        (None, Some(path)) => read_file(path)?,
        (None, None) => String::new(),
    };
    let sql_setup = sql_setup.map(read_file).transpose()?;

    Ok(RunRequest {
        code,
        language: lang.to_string(),
        input,
        sql_setup,
    })
}

/// Load an evaluation request, optionally replacing its code
fn load_evaluation(request: &Path, file: Option<&Path>) -> Result<EvaluationRequest> {
    let content = read_file(request)?;
    let mut evaluation: EvaluationRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", request.display()))?;
    if let Some(path) = file {
        evaluation.code = read_file(path)?;
    }
    Ok(evaluation)
}

pub async fn run_file(
    lang: &str,
    file: &Path,
    input: Option<String>,
    input_file: Option<&Path>,
    sql_setup: Option<&Path>,
) -> Result<()> {
    let request = build_run_request(lang, file, input, input_file, sql_setup)?;
    let response = executor()?.run_wire(request).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.exit_code != 0 {
        bail!("Program exited with code {}", response.exit_code);
    }
    Ok(())
}

pub async fn evaluate(request: &Path, file: Option<&Path>) -> Result<()> {
    let evaluation = load_evaluation(request, file)?;
    let verdict = executor()?.evaluate(&evaluation).await?;

    // stdout carries only the verdict JSON
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    eprintln!("\n{}", verdict_banner(&verdict));
    Ok(())
}

fn verdict_banner(verdict: &Verdict) -> String {
    format!(
        "{} Score: {} ({} / {} tests passed)",
        if verdict.correctness { "✅ Correct." } else { "❌ Incorrect." },
        verdict.score,
        verdict.test_cases_passed,
        verdict.total_test_cases
    )
}

pub fn list_toolchains() -> Result<()> {
    let statuses = executor()?.toolchains();

    println!("🔧 Toolchains:\n");
    println!("{:<12} {:<10} {:<8} {}", "Language", "Status", "Remote", "Path");
    println!("{}", "─".repeat(70));
    for status in statuses {
        println!(
            "{:<12} {:<10} {:<8} {}",
            status.language.to_string(),
            status.status,
            if status.remote_fallback { "yes" } else { "no" },
            status
                .path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

pub fn list_languages() -> Result<()> {
    let config = Config::from_env();
    let manager = LanguageConfigManager::load_or_builtin(&config.languages_file)?;

    println!("📋 Configured Languages:\n");
    println!("{:<12} {:<6} {:<20} {:<20} {}", "Name", "Ext", "Compilers", "Runtimes", "Remote");
    println!("{}", "─".repeat(80));
    for name in manager.list_languages() {
        let Some(language) = polyglot_common::Language::from_str(&name) else {
            continue;
        };
        let lang = manager.get_config(language);
        println!(
            "{:<12} {:<6} {:<20} {:<20} {}",
            lang.name,
            lang.file_extension,
            lang.compilers.join(","),
            lang.runtimes.join(","),
            lang.remote_language.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_run_request_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.py");
        let stdin = dir.path().join("in.txt");
        fs::write(&src, "print(input())").unwrap();
        fs::write(&stdin, "hello\n").unwrap();

        let request = build_run_request("python", &src, None, Some(&stdin), None).unwrap();
        assert_eq!(request.code, "print(input())");
        assert_eq!(request.input, "hello\n");
        assert!(request.sql_setup.is_none());

        let request = build_run_request("python", &src, Some("x".to_string()), None, None).unwrap();
        assert_eq!(request.input, "x");
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let result = build_run_request("python", Path::new("no/such/file.py"), None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_evaluation_with_override() {
        let dir = tempfile::tempdir().unwrap();
        let req = dir.path().join("req.json");
        let src = dir.path().join("solution.py");
        fs::write(
            &req,
            r#"{"question_text": "Add", "code": "pass", "language": "python",
                "test_cases": [{"input": [2, 3], "output": 5}]}"#,
        )
        .unwrap();
        fs::write(&src, "def add(a, b):\n    return a + b\n").unwrap();

        let evaluation = load_evaluation(&req, Some(&src)).unwrap();
        assert!(evaluation.code.starts_with("def add"));
        assert_eq!(evaluation.effective_test_cases()[0].input, "[2,3]");
    }

    #[test]
    fn test_verdict_banner() {
        let verdict: Verdict = serde_json::from_value(serde_json::json!({
            "correctness": true,
            "score": 90,
            "feedback": "Good",
            "test_cases_passed": 2,
            "total_test_cases": 2,
            "canonical_solution": "",
            "execution_summary": "",
            "execution_output": "",
            "execution_time_seconds": 0.1,
            "time_complexity": "O(1)",
            "space_complexity": "O(1)",
            "improvements": [],
            "motivation_message": "",
            "test_results": []
        }))
        .unwrap();
        assert_eq!(verdict_banner(&verdict), "✅ Correct. Score: 90 (2 / 2 tests passed)");

        let printed = serde_json::to_string_pretty(&verdict).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&printed).unwrap();
        assert_eq!(parsed["score"], 90);
    }
}
