/// Execution Engine - Local Process Execution
///
/// **Core Responsibility:**
/// Run a resolved toolchain against a workspace and capture raw outputs.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (interpreter, compile-then-run)
/// - Engine does NOT evaluate correctness
/// - Engine returns an `ExecutionResult` for the evaluator to judge
///
/// **Safety Rules:**
/// - Never invokes a shell: programs receive a literal argument vector
/// - Every step runs under a hard timeout; the child is killed on expiry
/// - Compile failure short-circuits, the run step is never attempted
use crate::toolchain::Toolchain;
use crate::workspace::Workspace;
use lazy_static::lazy_static;
use polyglot_common::types::{BudgetClass, ExecutionResult, FailureKind, Language};
use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit code reported for a killed-on-timeout run
pub const TIMEOUT_EXIT_CODE: i32 = 124;
/// Exit code reported when the toolchain binary could not be spawned
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

lazy_static! {
    static ref MISSING_MODULE: Regex =
        Regex::new(r#"(?i)no module named ['"]([^'"]+)['"]"#).expect("valid regex");
    static ref MISSING_NODE_MODULE: Regex =
        Regex::new(r#"Cannot find module ['"]([^'"]+)['"]"#).expect("valid regex");
}

/// Raw output of one spawned step
#[derive(Debug)]
struct StepOutput {
    stdout: String,
    stderr: String,
    status: Option<ExitStatus>,
    timed_out: bool,
}

impl StepOutput {
    fn succeeded(&self) -> bool {
        !self.timed_out && self.status.map(|s| s.success()).unwrap_or(false)
    }

    fn exit_code(&self) -> i32 {
        match self.status {
            Some(status) => exit_code_of(&status),
            None => TIMEOUT_EXIT_CODE,
        }
    }
}

/// Spawns interpreters and compilers with per-category time budgets
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    interpreted_budget: Duration,
    compiled_budget: Duration,
}

impl ProcessExecutor {
    pub fn new(interpreted_budget: Duration, compiled_budget: Duration) -> Self {
        Self {
            interpreted_budget,
            compiled_budget,
        }
    }

    /// Time budget of one step for a language
    pub fn budget_for(&self, language: Language) -> Duration {
        match language.budget_class() {
            BudgetClass::Interpreted => self.interpreted_budget,
            BudgetClass::Compiled => self.compiled_budget,
        }
    }

    /// Execute the workspace source with the given toolchain and stdin
    #[tracing::instrument(skip(self, workspace, stdin), fields(language = %language, stdin_size = stdin.len()))]
    pub async fn run(
        &self,
        language: Language,
        workspace: &Workspace,
        toolchain: &Toolchain,
        stdin: &str,
    ) -> ExecutionResult {
        let start = Instant::now();
        let budget = self.budget_for(language);

        let result = match toolchain {
            Toolchain::Interpreter { program } => {
                let args = [workspace.source_path().as_os_str().to_os_string()];
                match self.step(program, &args, workspace.path(), Some(stdin), budget).await {
                    Ok(out) => classify_run(language, out, budget),
                    Err(e) => spawn_failure(language, program, e),
                }
            }
            Toolchain::Jvm { javac, java } => {
                self.run_jvm(workspace, javac, java, stdin, budget).await
            }
            Toolchain::Native { compiler } => {
                self.run_native(language, workspace, compiler, stdin, budget).await
            }
        };

        let result = result.with_duration(start.elapsed().as_secs_f64());
        log_outcome(language, &result);
        result
    }

    async fn run_jvm(
        &self,
        workspace: &Workspace,
        javac: &Path,
        java: &Path,
        stdin: &str,
        budget: Duration,
    ) -> ExecutionResult {
        let compile_args = [workspace.source_path().as_os_str().to_os_string()];
        let compiled = match self.step(javac, &compile_args, workspace.path(), None, budget).await {
            Ok(out) => out,
            Err(e) => return spawn_failure(Language::Java, javac, e),
        };
        if let Some(failure) = compile_failure(Language::Java, &compiled, budget) {
            return failure;
        }

        let Some(class_name) = locate_main_class(workspace) else {
            return ExecutionResult::failure(
                FailureKind::CompileError,
                "Compilation succeeded but class file not found. Ensure the class name matches \
                 the file name or use 'public class ClassName'.",
                1,
            );
        };

        let run_args = [
            OsString::from("-cp"),
            workspace.path().as_os_str().to_os_string(),
            OsString::from(class_name),
        ];
        match self.step(java, &run_args, workspace.path(), Some(stdin), budget).await {
            Ok(out) => classify_run(Language::Java, out, budget),
            Err(e) => spawn_failure(Language::Java, java, e),
        }
    }

    async fn run_native(
        &self,
        language: Language,
        workspace: &Workspace,
        compiler: &Path,
        stdin: &str,
        budget: Duration,
    ) -> ExecutionResult {
        let binary = workspace
            .path()
            .join(if cfg!(windows) { "a.exe" } else { "a.out" });
        let compile_args = [
            workspace.source_path().as_os_str().to_os_string(),
            OsString::from("-o"),
            binary.as_os_str().to_os_string(),
        ];
        let compiled = match self.step(compiler, &compile_args, workspace.path(), None, budget).await {
            Ok(out) => out,
            Err(e) => return spawn_failure(language, compiler, e),
        };
        if let Some(failure) = compile_failure(language, &compiled, budget) {
            return failure;
        }
        if !binary.exists() {
            return ExecutionResult::failure(
                FailureKind::CompileError,
                "Compilation succeeded but executable not found.",
                1,
            );
        }

        match self.step(&binary, &[], workspace.path(), Some(stdin), budget).await {
            Ok(out) => classify_run(language, out, budget),
            Err(e) => ExecutionResult::failure(
                FailureKind::RuntimeError,
                format!("Failed to start compiled program: {}", e),
                1,
            ),
        }
    }

    /// Spawn one program with a literal argument vector and wait under a budget
    async fn step(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: &Path,
        stdin: Option<&str>,
        budget: Duration,
    ) -> io::Result<StepOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // JVM banner lines would otherwise land in stderr
            .env_remove("JAVA_TOOL_OPTIONS")
            .env("PYTHONIOENCODING", "utf-8")
            .kill_on_drop(true);

        debug!(program = %program.display(), args = ?args, "Spawning step");
        let mut child = cmd.spawn()?;

        if let (Some(mut pipe), Some(input)) = (child.stdin.take(), stdin) {
            let data = input.as_bytes().to_vec();
            tokio::spawn(async move {
                // programs that never read stdin close the pipe early
                if let Err(e) = pipe.write_all(&data).await {
                    debug!(error = %e, "stdin not fully consumed");
                }
            });
        }

        // dropping the future on timeout drops the child, which kills it
        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(StepOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    status: Some(output.status),
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!(
                    program = %program.display(),
                    timeout_ms = budget.as_millis() as u64,
                    "Step timed out - process killed"
                );
                Ok(StepOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    status: None,
                    timed_out: true,
                })
            }
        }
    }
}

/// Map a finished run step onto an ExecutionResult
fn classify_run(language: Language, out: StepOutput, budget: Duration) -> ExecutionResult {
    if out.timed_out {
        return timeout_result(budget);
    }
    if out.succeeded() {
        return ExecutionResult {
            stdout: out.stdout,
            stderr: out.stderr,
            exit_code: 0,
            duration_seconds: 0.0,
            failure_kind: FailureKind::None,
        };
    }

    let exit_code = out.exit_code();
    let mut stderr = out.stderr;

    let failure_kind = if is_missing_module(language, &stderr) {
        stderr = missing_module_message(language, &stderr);
        FailureKind::ModuleMissing
    } else if is_interpreter_syntax_error(language, &stderr) {
        FailureKind::CompileError
    } else {
        if let Some(hint) = out.status.as_ref().and_then(signal_hint) {
            stderr.push_str(hint);
        }
        FailureKind::RuntimeError
    };

    ExecutionResult {
        stdout: out.stdout,
        stderr,
        exit_code,
        duration_seconds: 0.0,
        failure_kind,
    }
}

/// Some(result) when the compile step did not succeed
fn compile_failure(language: Language, out: &StepOutput, budget: Duration) -> Option<ExecutionResult> {
    if out.timed_out {
        return Some(timeout_result(budget));
    }
    if out.succeeded() {
        return None;
    }

    let details = [out.stderr.trim(), out.stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or("Compilation failed");

    let message = match language {
        Language::Java => format!(
            "Java Compilation Error:\n{}\n\nTip: Ensure your class name matches the filename and all syntax is correct.",
            details
        ),
        _ => format!(
            "C/C++ Compilation Error:\n{}\n\nTip: Check for syntax errors, missing includes, or undefined references.",
            details
        ),
    };

    Some(ExecutionResult::failure(
        FailureKind::CompileError,
        message,
        out.exit_code().max(1),
    ))
}

fn timeout_result(budget: Duration) -> ExecutionResult {
    ExecutionResult::failure(
        FailureKind::Timeout,
        format!(
            "Execution timeout ({} seconds exceeded). Your code took too long to execute.\n\n\
             Tip: Check for infinite loops, optimize your algorithm, or reduce input size.",
            budget.as_secs()
        ),
        TIMEOUT_EXIT_CODE,
    )
}

/// The program could not be spawned at all
fn spawn_failure(language: Language, program: &Path, err: io::Error) -> ExecutionResult {
    if err.kind() == io::ErrorKind::NotFound {
        return ExecutionResult::failure(
            FailureKind::ToolchainMissing,
            toolchain_missing_message(language),
            NOT_FOUND_EXIT_CODE,
        );
    }
    ExecutionResult::failure(
        FailureKind::RuntimeError,
        format!(
            "Execution error: failed to start {}: {}\n\nTip: This might be a permissions issue. Please contact support.",
            program.display(),
            err
        ),
        1,
    )
}

/// Human readable hint for a toolchain that is not installed
pub fn toolchain_missing_message(language: Language) -> String {
    match language {
        Language::Python => {
            "Python interpreter not found. Please ensure Python is installed and in your PATH."
        }
        Language::Java => {
            "Java compiler (javac) or runtime (java) not found. Please install Java JDK and add it to your PATH."
        }
        Language::JavaScript => {
            "Node.js not found. Please install Node.js from https://nodejs.org/ and add it to your PATH."
        }
        Language::C => {
            "GCC compiler not found. On Windows, install MinGW or Visual Studio Build Tools. On Linux/Mac, install gcc via package manager."
        }
        Language::Cpp => {
            "G++ compiler not found. On Windows, install MinGW or Visual Studio Build Tools. On Linux/Mac, install g++ via package manager."
        }
        Language::Sql => "Embedded SQL engine unavailable.",
    }
    .to_string()
}

fn is_missing_module(language: Language, stderr: &str) -> bool {
    match language {
        Language::Python => {
            stderr.contains("ModuleNotFoundError") || MISSING_MODULE.is_match(stderr)
        }
        Language::JavaScript => MISSING_NODE_MODULE.is_match(stderr),
        _ => false,
    }
}

fn missing_module_message(language: Language, stderr: &str) -> String {
    if language == Language::JavaScript {
        let module = MISSING_NODE_MODULE
            .captures(stderr)
            .map(|caps| caps[1].to_string())
            .unwrap_or_default();
        return format!(
            "Error: Cannot find module '{}'. Only Node.js built-in modules are available \
             in the execution environment.",
            module
        );
    }

    match MISSING_MODULE.captures(stderr) {
        Some(caps) => format!(
            "ModuleNotFoundError: '{}' is not available in the execution environment. \
             Please use Python standard library only.",
            &caps[1]
        ),
        None => format!(
            "ModuleNotFoundError: a required module is not available. \
             Please use only Python standard library modules.\n{}",
            stderr.trim()
        ),
    }
}

/// Interpreters report syntax errors at run time; treat them as compile errors
fn is_interpreter_syntax_error(language: Language, stderr: &str) -> bool {
    match language {
        Language::Python => ["SyntaxError:", "IndentationError:", "TabError:"]
            .iter()
            .any(|marker| stderr.contains(marker)),
        Language::JavaScript => stderr.contains("SyntaxError:"),
        _ => false,
    }
}

#[cfg(unix)]
fn exit_code_of(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn signal_hint(status: &ExitStatus) -> Option<&'static str> {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(9) => Some("\n[Process killed: likely exceeded a memory limit]"),
        Some(11) => Some("\n[Process killed: segmentation fault]"),
        Some(6) => Some("\n[Process aborted]"),
        _ => None,
    }
}

#[cfg(not(unix))]
fn signal_hint(_status: &ExitStatus) -> Option<&'static str> {
    None
}

/// Class to launch after javac: the file stem if it compiled, else any class file
fn locate_main_class(workspace: &Workspace) -> Option<String> {
    let expected: PathBuf = workspace.path().join(format!("{}.class", workspace.stem()));
    if expected.exists() {
        return Some(workspace.stem().to_string());
    }

    let mut classes: Vec<String> = std::fs::read_dir(workspace.path())
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension() == Some(OsStr::new("class")))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    classes.sort();
    classes.into_iter().next()
}

fn log_outcome(language: Language, result: &ExecutionResult) {
    let duration_ms = (result.duration_seconds * 1000.0) as u64;
    match result.failure_kind {
        FailureKind::None => info!(
            language = %language,
            duration_ms,
            stdout_size = result.stdout.len(),
            "Execution completed"
        ),
        kind => warn!(
            language = %language,
            duration_ms,
            exit_code = result.exit_code,
            failure = ?kind,
            error_preview = result.stderr.lines().next().unwrap_or(""),
            "Execution failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageConfigManager;
    use crate::toolchain::{Resolution, ToolchainResolver};

    fn executor() -> ProcessExecutor {
        ProcessExecutor::new(Duration::from_secs(10), Duration::from_secs(5))
    }

    fn local_toolchain(language: Language) -> Option<Toolchain> {
        let resolver = ToolchainResolver::new("venv", LanguageConfigManager::builtin());
        match resolver.resolve(language) {
            Resolution::Process(tc) => Some(tc),
            _ => None,
        }
    }

    async fn run(language: Language, source: &str, stdin: &str) -> Option<(ExecutionResult, PathBuf)> {
        let toolchain = local_toolchain(language)?;
        let manager = LanguageConfigManager::builtin();
        let ws = Workspace::acquire(language, manager.get_config(language), source).unwrap();
        let path = ws.path().to_path_buf();
        let result = executor().run(language, &ws, &toolchain, stdin).await;
        ws.release();
        Some((result, path))
    }

    #[test]
    fn test_budget_selection() {
        let ex = executor();
        assert_eq!(ex.budget_for(Language::Python), Duration::from_secs(10));
        assert_eq!(ex.budget_for(Language::Sql), Duration::from_secs(10));
        assert_eq!(ex.budget_for(Language::Cpp), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_module_message_names_module() {
        let stderr = "Traceback...\nModuleNotFoundError: No module named 'pandas'\n";
        assert!(is_missing_module(Language::Python, stderr));
        assert!(missing_module_message(Language::Python, stderr).contains("'pandas'"));
        assert!(!is_missing_module(Language::Python, "NameError: name 'x' is not defined"));
    }

    #[test]
    fn test_node_missing_module() {
        let stderr = "node:internal/modules/cjs/loader:1080\n  throw err;\n  ^\n\n\
                      Error: Cannot find module 'lodash'\nRequire stack:\n- /tmp/code.js\n";
        assert!(is_missing_module(Language::JavaScript, stderr));
        assert!(!is_missing_module(Language::Python, stderr));
        assert!(missing_module_message(Language::JavaScript, stderr).contains("'lodash'"));

        let out = StepOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            status: None,
            timed_out: false,
        };
        let result = classify_run(Language::JavaScript, out, Duration::from_secs(10));
        assert_eq!(result.failure_kind, FailureKind::ModuleMissing);
        assert!(result.stderr.contains("'lodash'"));
    }

    #[test]
    fn test_interpreter_syntax_errors() {
        assert!(is_interpreter_syntax_error(
            Language::Python,
            "  File \"code.py\", line 1\nSyntaxError: invalid syntax"
        ));
        assert!(is_interpreter_syntax_error(Language::Python, "IndentationError: unexpected indent"));
        assert!(!is_interpreter_syntax_error(Language::Python, "ZeroDivisionError: division by zero"));
        assert!(!is_interpreter_syntax_error(Language::Java, "SyntaxError: nope"));
    }

    #[test]
    fn test_compile_failure_short_circuits_with_hint() {
        let out = StepOutput {
            stdout: String::new(),
            stderr: "Main.java:3: error: ';' expected".to_string(),
            status: None,
            timed_out: false,
        };
        let failure = compile_failure(Language::Java, &out, Duration::from_secs(5)).unwrap();
        assert_eq!(failure.failure_kind, FailureKind::CompileError);
        assert!(failure.stderr.starts_with("Java Compilation Error:"));
        assert!(failure.stdout.is_empty());
    }

    #[test]
    fn test_timeout_result_shape() {
        let result = timeout_result(Duration::from_secs(5));
        assert_eq!(result.failure_kind, FailureKind::Timeout);
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("infinite loops"));
    }

    #[test]
    fn test_spawn_not_found_is_toolchain_missing() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let result = spawn_failure(Language::C, Path::new("gcc"), err);
        assert_eq!(result.failure_kind, FailureKind::ToolchainMissing);
        assert_eq!(result.exit_code, NOT_FOUND_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_python_echo_and_cleanup() {
        let Some((result, path)) = run(Language::Python, "print(input()[::-1])", "abc\n").await else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::None);
        assert_eq!(result.stdout.trim(), "cba");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_python_runtime_error() {
        let Some((result, _)) = run(Language::Python, "print(1 // 0)", "").await else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::RuntimeError);
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_python_syntax_error_is_compile_error() {
        let Some((result, _)) = run(Language::Python, "def broken(:\n    pass\n", "").await else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::CompileError);
    }

    #[tokio::test]
    async fn test_python_missing_module() {
        let Some((result, _)) =
            run(Language::Python, "import definitely_missing_module_xyz\n", "").await
        else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::ModuleMissing);
        assert!(result.stderr.contains("definitely_missing_module_xyz"));
    }

    #[tokio::test]
    async fn test_timeout_kills_and_cleans_up() {
        let Some(toolchain) = local_toolchain(Language::Python) else {
            return;
        };
        let manager = LanguageConfigManager::builtin();
        let ws = Workspace::acquire(
            Language::Python,
            manager.get_config(Language::Python),
            "while True:\n    pass\n",
        )
        .unwrap();
        let path = ws.path().to_path_buf();
        let quick = ProcessExecutor::new(Duration::from_millis(500), Duration::from_millis(500));
        let result = quick.run(Language::Python, &ws, &toolchain, "").await;
        drop(ws);

        assert_eq!(result.failure_kind, FailureKind::Timeout);
        assert!(result.stdout.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_c_compile_error_never_runs() {
        let Some((result, path)) = run(Language::C, "int main( { return 0 }", "").await else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::CompileError);
        assert!(result.stderr.contains("Compilation Error"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cpp_reads_stdin() {
        let src = "#include <iostream>\nint main(){int a,b;std::cin>>a>>b;std::cout<<a+b<<std::endl;}";
        let Some((result, _)) = run(Language::Cpp, src, "2 3\n").await else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::None);
        assert_eq!(result.stdout.trim(), "5");
    }

    #[tokio::test]
    async fn test_java_runs_named_class() {
        let src = "import java.util.*;\npublic class Greeter {\n  public static void main(String[] a) {\n    Scanner s = new Scanner(System.in);\n    System.out.println(\"hi \" + s.nextLine());\n  }\n}\n";
        let Some((result, _)) = run(Language::Java, src, "bob\n").await else {
            return;
        };
        assert_eq!(result.failure_kind, FailureKind::None);
        assert_eq!(result.stdout.trim(), "hi bob");
    }
}
