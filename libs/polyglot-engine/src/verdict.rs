//! Hybrid verdict engine
//!
//! Combines the holistic judgement with deterministic test evidence. Test
//! results outrank the judgement when there are any, a compile failure
//! outranks everything, and a judgement service outage degrades to a
//! rule-based verdict. A `Verdict` is always produced.

use crate::evaluator::tally;
use crate::judge::{Judge, Judgement, JudgementPrompt};
use polyglot_common::types::{ExecutionResult, FailureKind, TestCaseResult, Verdict};
use std::sync::Arc;
use tracing::{info, warn};

const CANONICAL_PLACEHOLDER: &str =
    "# Correct solution will be generated based on the problem requirements.";

/// Thresholds of the override policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictPolicy {
    /// Pass ratio at or above which a submission is forced correct
    pub pass_threshold: f64,
    /// Minimum score when every test passes
    pub all_pass_floor: u32,
    /// Minimum score of any correct verdict
    pub correct_floor: u32,
    /// Maximum score of any incorrect verdict
    pub incorrect_ceiling: u32,
    /// Score when there is no evidence either way
    pub neutral_score: u32,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            pass_threshold: 0.8,
            all_pass_floor: 85,
            correct_floor: 75,
            incorrect_ceiling: 50,
            neutral_score: 50,
        }
    }
}

impl VerdictPolicy {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            pass_threshold: threshold.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Score for a partial pass at or above the threshold
    fn scaled_pass_score(&self, ratio: f64) -> u32 {
        (70.0 + ratio * 15.0) as u32
    }
}

/// What the baseline run and the test runs showed
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    /// Run of the submission with empty stdin
    pub baseline: Option<ExecutionResult>,
    pub lines: Vec<String>,
}

impl ExecutionSummary {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            "No execution data available".to_string()
        } else {
            self.lines.join("\n")
        }
    }

    /// A syntax or compile failure, as opposed to a missing toolchain
    pub fn has_compile_failure(&self) -> bool {
        self.baseline
            .as_ref()
            .is_some_and(|b| b.failure_kind == FailureKind::CompileError)
    }

    /// The baseline failed for a reason attributable to the code
    pub fn baseline_error(&self) -> Option<&str> {
        self.baseline.as_ref().and_then(|b| match b.failure_kind {
            FailureKind::None | FailureKind::ToolchainMissing | FailureKind::RemoteServiceError => {
                None
            }
            _ => Some(b.stderr.as_str()),
        })
    }

    /// Human readable output of the baseline run
    pub fn execution_output(&self) -> String {
        match &self.baseline {
            None => String::new(),
            Some(b) if !b.is_success() => format!("Execution Error:\n{}", b.stderr.trim()),
            Some(b) if b.stdout.trim().is_empty() => "Code executed successfully but produced no output.\n\
                 This is normal for function definitions that don't print anything."
                .to_string(),
            Some(b) => b.stdout.clone(),
        }
    }

    fn execution_time(&self) -> Option<f64> {
        self.baseline.as_ref().map(|b| b.duration_seconds)
    }
}

/// The submission being judged
#[derive(Debug, Clone, Default)]
pub struct SubmissionContext {
    pub question: String,
    pub language: String,
    pub code: String,
    pub difficulty: Option<String>,
}

pub struct VerdictEngine {
    policy: VerdictPolicy,
    judge: Arc<dyn Judge>,
}

impl VerdictEngine {
    pub fn new(policy: VerdictPolicy, judge: Arc<dyn Judge>) -> Self {
        Self { policy, judge }
    }

    pub fn policy(&self) -> &VerdictPolicy {
        &self.policy
    }

    /// Produce the final verdict; never fails
    #[tracing::instrument(skip_all, fields(tests = results.len()))]
    pub async fn judge(
        &self,
        context: &SubmissionContext,
        summary: &ExecutionSummary,
        results: Vec<TestCaseResult>,
    ) -> Verdict {
        let prompt = JudgementPrompt {
            question: context.question.clone(),
            language: context.language.clone(),
            code: context.code.clone(),
            execution_summary: summary.render(),
            test_results: results.clone(),
            difficulty: context.difficulty.clone(),
        };

        match self.judge.judge(&prompt).await {
            Ok(judgement) => self.merge(summary, results, judgement),
            Err(e) => {
                warn!(error = %e, "Judgement unavailable, using rule-based verdict");
                self.fallback_verdict(context, summary, results)
            }
        }
    }

    /// Apply the override policy on top of a judgement
    pub fn merge(
        &self,
        summary: &ExecutionSummary,
        results: Vec<TestCaseResult>,
        judgement: Judgement,
    ) -> Verdict {
        let policy = &self.policy;
        let (passed, total) = tally(&results);

        let mut correctness = judgement.correctness;
        let mut score = match judgement.score {
            Some(s) => s.clamp(0.0, 100.0) as u32,
            None if correctness => 85,
            None => 40,
        };

        if total > 0 {
            let ratio = passed as f64 / total as f64;
            if passed == total {
                correctness = true;
                score = score.max(policy.all_pass_floor);
            } else if ratio >= policy.pass_threshold {
                correctness = true;
                if score < 70 {
                    score = policy.scaled_pass_score(ratio);
                }
            }
        }

        if summary.has_compile_failure() {
            correctness = false;
            score = 0;
        }

        if correctness {
            score = score.max(policy.correct_floor);
        } else {
            score = score.min(policy.incorrect_ceiling);
        }

        let (test_cases_passed, total_test_cases) = if total > 0 {
            (passed, total)
        } else {
            let total = judgement.total_test_cases.unwrap_or(0);
            (judgement.test_cases_passed.unwrap_or(0).min(total), total)
        };

        let feedback = match summary.baseline_error() {
            Some(error) => {
                let first = error.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
                if judgement.feedback.trim().is_empty() {
                    format!("Execution Error: {}", first)
                } else {
                    format!("Execution Error: {}\n\n{}", first, judgement.feedback)
                }
            }
            None if judgement.feedback.trim().is_empty() => default_feedback(correctness),
            None => judgement.feedback,
        };

        let canonical_solution = if judgement.canonical_solution.trim().is_empty() {
            CANONICAL_PLACEHOLDER.to_string()
        } else {
            judgement.canonical_solution
        };

        info!(correctness, score, test_cases_passed, total_test_cases, "Verdict reached");

        Verdict {
            correctness,
            score,
            feedback,
            test_cases_passed,
            total_test_cases,
            canonical_solution,
            execution_summary: summary.render(),
            execution_output: summary.execution_output(),
            execution_time_seconds: summary.execution_time(),
            time_complexity: judgement.time_complexity,
            space_complexity: judgement.space_complexity,
            improvements: judgement.improvements,
            motivation_message: judgement.motivation_message,
            test_results: results,
        }
    }

    /// Rule-based verdict from test evidence alone
    pub fn fallback_verdict(
        &self,
        context: &SubmissionContext,
        summary: &ExecutionSummary,
        results: Vec<TestCaseResult>,
    ) -> Verdict {
        let policy = &self.policy;
        let (passed, total) = tally(&results);

        let mut verdict = Verdict {
            correctness: false,
            score: 0,
            feedback: String::new(),
            test_cases_passed: passed,
            total_test_cases: total,
            canonical_solution: canonical_template(&context.question),
            execution_summary: summary.render(),
            execution_output: summary.execution_output(),
            execution_time_seconds: summary.execution_time(),
            time_complexity: String::new(),
            space_complexity: String::new(),
            improvements: Vec::new(),
            motivation_message: String::new(),
            test_results: Vec::new(),
        };

        let error = summary.baseline_error().map(str::to_string);
        if summary.has_compile_failure() || (total == 0 && error.is_some()) {
            let message = error.unwrap_or_default();
            let first = message.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
            verdict.feedback = format!(
                "CORRECTNESS:\nYour code encountered an execution error: {}\n\n\
                 IMPROVEMENTS:\n\
                 - Check syntax errors (missing brackets, colons, parentheses)\n\
                 - Verify all variables are defined before use\n\
                 - Test with simple inputs first\n\n\
                 LOGIC TIP:\nRead error messages carefully, they usually point to the exact issue.\n\n\
                 MOTIVATION:\nErrors are part of learning. Review the error and try again.",
                first
            );
            verdict.improvements = vec![
                "Fix syntax errors".to_string(),
                "Check variable definitions".to_string(),
                "Verify logic flow".to_string(),
            ];
            verdict.motivation_message =
                "Keep practicing! Every programmer faces errors, the key is learning from them."
                    .to_string();
        } else if total > 0 {
            let ratio = passed as f64 / total as f64;
            let mut feedback = format!(
                "Test Case Analysis:\nYour solution passed {} out of {} test cases.\n\nTest Case Details:",
                passed, total
            );
            for (i, r) in results.iter().enumerate() {
                feedback.push_str(&format!(
                    "\n\nTest {}: {}\n  Input: {}\n  Expected: {}\n  Got: {}",
                    i + 1,
                    if r.passed { "PASSED" } else { "FAILED" },
                    r.test_case.input.trim(),
                    r.test_case.expected_output,
                    r.actual_output
                ));
            }

            if passed == total {
                verdict.correctness = true;
                verdict.score = policy.all_pass_floor;
                feedback.push_str("\n\nGreat job! Your solution passed all test cases.");
                verdict.motivation_message =
                    "Excellent work! You've solved this problem. Keep practicing to master harder ones."
                        .to_string();
            } else if ratio >= policy.pass_threshold {
                verdict.correctness = true;
                verdict.score = policy.scaled_pass_score(ratio);
                feedback.push_str("\n\nAlmost there! Review the failed cases to cover every edge case.");
                verdict.motivation_message = format!(
                    "You passed {} out of {} test cases. A little polish and you're done!",
                    passed, total
                );
            } else {
                verdict.score = (ratio * 60.0) as u32;
                feedback.push_str("\n\nPlease review your logic and ensure all test cases pass.");
                verdict.motivation_message = format!(
                    "You passed {} out of {} test cases. Review the failed cases, understand why they failed, and refine your solution.",
                    passed, total
                );
            }
            verdict.feedback = feedback;
        } else {
            verdict.score = policy.neutral_score;
            verdict.feedback = "Code Execution Analysis:\n\
                 Your code executed, but a full evaluation requires test cases or AI analysis.\n\n\
                 To improve your solution:\n\
                 1. Review the problem requirements carefully\n\
                 2. Test with the provided examples\n\
                 3. Consider edge cases\n\
                 4. Optimize time and space complexity"
                .to_string();
        }

        info!(
            correctness = verdict.correctness,
            score = verdict.score,
            passed,
            total,
            "Rule-based verdict reached"
        );
        verdict.test_results = results;
        verdict
    }
}

fn default_feedback(correct: bool) -> String {
    if correct {
        "CORRECTNESS:\nYour solution works correctly and handles the main requirement.\n\n\
         MOTIVATION:\nGreat job! Keep practicing to improve consistency."
            .to_string()
    } else {
        "CORRECTNESS:\nYour solution needs some adjustments. Review the execution output for details.\n\n\
         IMPROVEMENTS:\n- Check the error messages carefully\n- Verify your logic handles all test cases\n\n\
         MOTIVATION:\nKeep practicing! Mistakes are learning opportunities."
            .to_string()
    }
}

fn canonical_template(question: &str) -> String {
    let headline: String = question.chars().take(80).collect();
    format!(
        "# Correct Solution for: {}...\n\
         # Approach:\n\
         # 1. Understand the problem requirements\n\
         # 2. Identify the optimal algorithm/data structure\n\
         # 3. Handle edge cases\n\
         # 4. Optimize for time and space complexity\n\
         # Note: a generated solution is temporarily unavailable.\n\
         def solve():\n    pass",
        headline
    )
}
