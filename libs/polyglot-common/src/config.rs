use std::env;
use std::path::PathBuf;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of the bundled virtual environment (preferred Python)
    pub venv_dir: PathBuf,
    /// Toolchain table consumed by the engine's LanguageConfigManager
    pub languages_file: PathBuf,
    pub interpreted_timeout_secs: u64,
    pub compiled_timeout_secs: u64,
    pub remote_enabled: bool,
    pub remote_url: String,
    pub remote_timeout_secs: u64,
    /// Absent key disables the judgement service
    pub judge_api_key: Option<String>,
    pub judge_api_base: String,
    pub judge_models: Vec<String>,
    pub judge_timeout_secs: u64,
    pub pass_threshold: f64,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            venv_dir: env::var("POLYGLOT_VENV_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("venv")),
            languages_file: env::var("POLYGLOT_LANGUAGES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config/languages.json")),
            interpreted_timeout_secs: parse_env("POLYGLOT_INTERPRETED_TIMEOUT_SECS").unwrap_or(10),
            compiled_timeout_secs: parse_env("POLYGLOT_COMPILED_TIMEOUT_SECS").unwrap_or(5),
            remote_enabled: parse_env("POLYGLOT_REMOTE_ENABLED").unwrap_or(true),
            remote_url: env::var("POLYGLOT_REMOTE_URL")
                .unwrap_or_else(|_| "https://emkc.org/api/v2/piston/execute".to_string()),
            remote_timeout_secs: parse_env("POLYGLOT_REMOTE_TIMEOUT_SECS").unwrap_or(10),
            judge_api_key: env::var("JUDGE_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            judge_api_base: env::var("JUDGE_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            judge_models: env::var("JUDGE_MODELS")
                .map(|v| split_list(&v))
                .ok()
                .filter(|models| !models.is_empty())
                .unwrap_or_else(default_models),
            judge_timeout_secs: parse_env("JUDGE_TIMEOUT_SECS").unwrap_or(30),
            pass_threshold: parse_env("VERDICT_PASS_THRESHOLD")
                .filter(|t: &f64| (0.0..=1.0).contains(t))
                .unwrap_or(0.8),
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_models() -> Vec<String> {
    vec![
        "gpt-4o".to_string(),
        "gpt-4".to_string(),
        "gpt-3.5-turbo".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.interpreted_timeout_secs > 0);
        assert!(config.compiled_timeout_secs > 0);
        assert!(!config.judge_models.is_empty());
        assert!((0.0..=1.0).contains(&config.pass_threshold));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }
}
