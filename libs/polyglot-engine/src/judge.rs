//! Holistic judgement service
//!
//! The `Judge` trait is the seam between the verdict engine and whatever
//! produces a holistic opinion of a submission. The production implementation
//! talks to an OpenAI-compatible chat completions endpoint; tests plug in
//! canned judges.

use crate::error::JudgeError;
use async_trait::async_trait;
use lazy_static::lazy_static;
use polyglot_common::types::TestCaseResult;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum improvement suggestions kept from a judgement
const MAX_IMPROVEMENTS: usize = 3;

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("valid regex");
}

/// Everything the judge is shown about a submission
#[derive(Debug, Clone)]
pub struct JudgementPrompt {
    pub question: String,
    pub language: String,
    pub code: String,
    pub execution_summary: String,
    pub test_results: Vec<TestCaseResult>,
    pub difficulty: Option<String>,
}

impl JudgementPrompt {
    pub fn system_message(&self) -> &'static str {
        "You are an expert coding interview evaluator. Keep feedback short and precise: \
         one or two sentences per section, no repetition. A solution is correct when it \
         implements the right algorithm, even if output formatting differs slightly. \
         For SQL, judge the query logic rather than exact output. \
         Always answer with a single JSON object."
    }

    pub fn user_message(&self) -> String {
        let mut tests = String::new();
        if !self.test_results.is_empty() {
            tests.push_str("\n\nTest Case Execution Results:\n");
            for (i, result) in self.test_results.iter().enumerate() {
                tests.push_str(&format!(
                    "Test Case {}:\n  Input: {}\n  Expected Output: {}\n  Actual Output: {}\n\n",
                    i + 1,
                    result.test_case.input,
                    result.test_case.expected_output,
                    result.actual_output
                ));
            }
        }

        format!(
            "Evaluate this coding solution.\n\n\
             QUESTION:\n{question}\n\n\
             CANDIDATE'S SOLUTION ({lang}):\n```{lang}\n{code}\n```\n\n\
             EXECUTION RESULTS:\n{summary}{tests}\n\n\
             DIFFICULTY LEVEL: {difficulty}\n\n\
             Respond with JSON containing: \
             \"correctness\" (boolean), \"score\" (0-100), \
             \"feedback\" (sections CORRECTNESS, IMPROVEMENTS, LOGIC TIP, MOTIVATION), \
             \"correct_solution\" (complete solution in {lang}), \
             \"test_cases_passed\" (number), \"total_test_cases\" ({total}), \
             \"time_complexity\", \"space_complexity\", \
             \"improvements\" (at most 3 strings), \"motivation_message\".",
            question = self.question,
            lang = self.language,
            code = self.code,
            summary = self.execution_summary,
            tests = tests,
            difficulty = self.difficulty.as_deref().unwrap_or("Medium"),
            total = self.test_results.len(),
        )
    }
}

/// Parsed opinion of the judgement service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Judgement {
    pub correctness: bool,
    /// Absent or unparseable scores are `None`
    pub score: Option<f64>,
    pub feedback: String,
    pub canonical_solution: String,
    pub time_complexity: String,
    pub space_complexity: String,
    pub improvements: Vec<String>,
    pub motivation_message: String,
    pub test_cases_passed: Option<usize>,
    pub total_test_cases: Option<usize>,
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, prompt: &JudgementPrompt) -> Result<Judgement, JudgeError>;
}

/// Judge used when no API key is configured
#[derive(Debug, Default, Clone)]
pub struct DisabledJudge;

#[async_trait]
impl Judge for DisabledJudge {
    async fn judge(&self, _prompt: &JudgementPrompt) -> Result<Judgement, JudgeError> {
        Err(JudgeError::NotConfigured)
    }
}

/// OpenAI-compatible chat completions client with model fallback
#[derive(Debug, Clone)]
pub struct OpenAiJudge {
    http: Client,
    api_key: String,
    api_base: String,
    models: Vec<String>,
}

impl OpenAiJudge {
    pub fn new(api_key: String, api_base: String, models: Vec<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client, using defaults");
                Client::new()
            });
        Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            models,
        }
    }

    async fn ask(&self, model: &str, prompt: &JudgementPrompt) -> Result<Judgement, JudgeError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": prompt.system_message() },
                { "role": "user", "content": prompt.user_message() },
            ],
            "temperature": 0.3,
            "response_format": { "type": "json_object" },
        });

        debug!(url = %url, model, "Requesting judgement");
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JudgeError::Status(status.as_u16()));
        }

        let payload: Value = response.json().await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| JudgeError::Malformed("response has no message content".to_string()))?;

        let parsed: Value = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| JudgeError::Malformed(e.to_string()))?;
        parse_judgement(&parsed)
    }
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn judge(&self, prompt: &JudgementPrompt) -> Result<Judgement, JudgeError> {
        let mut last_error = JudgeError::NotConfigured;
        for model in &self.models {
            match self.ask(model, prompt).await {
                Ok(judgement) => {
                    info!(model = %model, correctness = judgement.correctness, "Judgement received");
                    return Ok(judgement);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Judgement attempt failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

/// Models sometimes wrap JSON in a markdown fence
fn strip_code_fence(content: &str) -> &str {
    match CODE_FENCE.captures(content).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => content.trim(),
    }
}

/// Read a judgement out of the service's JSON object
pub fn parse_judgement(value: &Value) -> Result<Judgement, JudgeError> {
    let object = value
        .as_object()
        .ok_or_else(|| JudgeError::Malformed("judgement is not a JSON object".to_string()))?;

    let correctness = match object.get("correctness") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "correct"
        ),
        _ => false,
    };

    let score = match object.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let count = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_f64)
            .filter(|n| *n >= 0.0)
            .map(|n| n as usize)
    };

    let improvements = object
        .get("improvements")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .take(MAX_IMPROVEMENTS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Judgement {
        correctness,
        score,
        feedback: text("feedback"),
        canonical_solution: {
            let solution = text("correct_solution");
            if solution.is_empty() {
                text("canonical_solution")
            } else {
                solution
            }
        },
        time_complexity: text("time_complexity"),
        space_complexity: text("space_complexity"),
        improvements,
        motivation_message: text("motivation_message"),
        test_cases_passed: count("test_cases_passed"),
        total_test_cases: count("total_test_cases"),
    })
}
