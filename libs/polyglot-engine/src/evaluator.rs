/// Test Evaluator - Language-Agnostic Output Comparison
///
/// **Core Responsibility:**
/// Compare raw execution outputs against expected outputs, one test at a time.
///
/// **Critical Properties:**
/// - Knows nothing about processes or toolchains
/// - Knows nothing about the judgement service
/// - Pure function: (execution result, test case) → boolean pass + reason
///
/// **Normalization Rules (Applied to All Languages):**
/// - Line endings: `\r\n` becomes `\n`
/// - Leading/trailing whitespace: trimmed
/// - Runs of spaces/tabs: collapsed to one space
/// - Runs of blank lines: collapsed to one newline
/// - Case sensitivity: YES (exact match required)
///
/// **Comparison Priority (first success wins):**
/// 1. Exact equality of normalized text → `exact`
/// 2. Both parse as numbers within 1e-9 → `numeric`
/// 3. Both parse as JSON or Python literals and are deeply equal → `structured`
use crate::literal::{parse_python_literal, values_equal};
use lazy_static::lazy_static;
use polyglot_common::types::{ExecutionResult, MatchReason, TestCase, TestCaseResult};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Tolerance for numeric equivalence
pub const NUMERIC_EPSILON: f64 = 1e-9;

lazy_static! {
    static ref HORIZONTAL_WS: Regex = Regex::new(r"[ \t]+").expect("valid regex");
    static ref BLANK_LINES: Regex = Regex::new(r"\n\s*\n+").expect("valid regex");
}

/// Normalize output text for comparison
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(output: &str) -> String {
    let unified = output.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WS.replace_all(unified.trim(), " ");
    let collapsed = BLANK_LINES.replace_all(&collapsed, "\n");
    // collapsing can leave a space next to a newline
    collapsed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Decide whether `actual` matches `expected`
pub fn compare(actual: &str, expected: &str) -> (bool, MatchReason) {
    let actual = normalize(actual);
    let expected = normalize(expected);

    if actual == expected {
        return (true, MatchReason::Exact);
    }

    if let (Ok(a), Ok(b)) = (actual.parse::<f64>(), expected.parse::<f64>()) {
        if (a - b).abs() < NUMERIC_EPSILON {
            return (true, MatchReason::Numeric);
        }
    }

    if let (Some(a), Some(b)) = (parse_structured(&actual), parse_structured(&expected)) {
        if values_equal(&a, &b) {
            return (true, MatchReason::Structured);
        }
    }

    (false, MatchReason::None)
}

/// JSON first, Python literal notation as fallback
fn parse_structured(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| parse_python_literal(text))
}

/// Evaluate one test case execution
///
/// A run that did not complete normally never passes; its stderr becomes the
/// reported actual output.
pub fn evaluate_test(result: &ExecutionResult, test_case: &TestCase) -> TestCaseResult {
    if !result.is_success() {
        return TestCaseResult {
            test_case: test_case.clone(),
            actual_output: format!("Error: {}", result.stderr.trim()),
            passed: false,
            match_reason: MatchReason::None,
        };
    }

    let (passed, match_reason) = compare(&result.stdout, &test_case.expected_output);
    debug!(passed, reason = ?match_reason, "Compared test output");

    TestCaseResult {
        test_case: test_case.clone(),
        actual_output: result.stdout.trim().to_string(),
        passed,
        match_reason,
    }
}

/// (passed, total) over a list of test results
pub fn tally(results: &[TestCaseResult]) -> (usize, usize) {
    (results.iter().filter(|r| r.passed).count(), results.len())
}

/// One line of the execution summary for test `index` (1-based)
pub fn summary_line(index: usize, result: &TestCaseResult) -> String {
    format!(
        "Test {} - Input: {}, Expected: {}, Got: {}, Passed: {}",
        index,
        result.test_case.input.trim(),
        result.test_case.expected_output,
        result.actual_output,
        result.passed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyglot_common::types::FailureKind;

    fn ok(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration_seconds: 0.01,
            failure_kind: FailureKind::None,
        }
    }

    fn case(input: &str, expected: &str) -> TestCase {
        TestCase {
            input: input.to_string(),
            expected_output: expected.to_string(),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("hello"), "hello");
        assert_eq!(normalize("  hello  \n"), "hello");
        assert_eq!(normalize("a\r\nb\r\n"), "a\nb");
        assert_eq!(normalize("a  \t b"), "a b");
        assert_eq!(normalize("a\n\n\n  \nb"), "a\nb");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "x",
            "  1 2\t3 \r\n\r\n\n4 ",
            "a \n b",
            "\t\n\t",
            "[1, 2,  3]\n\n",
            "line one  \n  \n\n line two\t\t\n",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(compare("120\n", "120"), (true, MatchReason::Exact));
        assert_eq!(compare("hello  world", "hello world"), (true, MatchReason::Exact));
    }

    #[test]
    fn test_numeric_match() {
        assert_eq!(compare("3.0", "3"), (true, MatchReason::Numeric));
        assert_eq!(compare("0.30000000000000004", "0.3"), (true, MatchReason::Numeric));
        assert_eq!(compare("3.1", "3"), (false, MatchReason::None));
    }

    #[test]
    fn test_structured_match() {
        assert_eq!(compare("[1, 2, 3]", "[1,2,3]"), (true, MatchReason::Structured));
        assert_eq!(
            compare("{'a': True, 'b': None}", r#"{"b": null, "a": true}"#),
            (true, MatchReason::Structured)
        );
        assert_eq!(compare("(1, 2)", "[1, 2]"), (true, MatchReason::Structured));
        assert_eq!(compare("[1, 2]", "[2, 1]"), (false, MatchReason::None));
    }

    #[test]
    fn test_deeply_nested_output_does_not_match() {
        assert_eq!(compare(&"[".repeat(200_000), "5"), (false, MatchReason::None));
        assert_eq!(compare(&"{".repeat(50_000), "{}"), (false, MatchReason::None));
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(compare("Hello", "hello"), (false, MatchReason::None));
    }

    #[test]
    fn test_failed_run_never_passes() {
        let failed = ExecutionResult::failure(FailureKind::RuntimeError, "ZeroDivisionError\n", 1);
        let result = evaluate_test(&failed, &case("", ""));
        assert!(!result.passed);
        assert_eq!(result.actual_output, "Error: ZeroDivisionError");
    }

    #[test]
    fn test_tally_and_summary() {
        let results = vec![
            evaluate_test(&ok("5\n"), &case("[2, 3]", "5")),
            evaluate_test(&ok("6\n"), &case("[2, 2]", "4")),
        ];
        assert_eq!(tally(&results), (1, 2));
        assert_eq!(
            summary_line(1, &results[0]),
            "Test 1 - Input: [2, 3], Expected: 5, Got: 5, Passed: true"
        );
    }
}
