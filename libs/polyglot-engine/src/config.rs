// Language toolchain configuration for the engine
use anyhow::{bail, Context, Result};
use polyglot_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// How one language is laid out on disk and which executables it needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub file_extension: String,
    /// File stem used when the source does not dictate one
    #[serde(default = "default_file_stem")]
    pub default_file_stem: String,
    /// Compiler candidates, first found wins (empty for interpreted languages)
    #[serde(default)]
    pub compilers: Vec<String>,
    /// Runtime/interpreter candidates, first found wins
    #[serde(default)]
    pub runtimes: Vec<String>,
    /// Language identifier understood by the remote execution service
    #[serde(default)]
    pub remote_language: Option<String>,
}

fn default_file_stem() -> String {
    "code".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<Language, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Parse a languages.json document
    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson = serde_json::from_str(content)?;

        let mut configs = Self::builtin().configs;
        for lang in languages_json.languages {
            let language = Language::from_str(&lang.name)
                .with_context(|| format!("Unknown language '{}' in languages.json", lang.name))?;
            configs.insert(language, lang);
        }

        Ok(Self { configs })
    }

    /// Load the file if present, otherwise fall back to the built-in table
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let manager = Self::load(config_path)?;
            info!(path = %config_path.display(), "Loaded language configuration");
            Ok(manager)
        } else {
            warn!(
                path = %config_path.display(),
                "Language config not found, using built-in toolchain table"
            );
            Ok(Self::builtin())
        }
    }

    /// Built-in toolchain table, mirrors config/languages.json
    pub fn builtin() -> Self {
        let entry = |name: &str,
                     ext: &str,
                     compilers: &[&str],
                     runtimes: &[&str],
                     remote: Option<&str>| LanguageConfig {
            name: name.to_string(),
            file_extension: ext.to_string(),
            default_file_stem: default_file_stem(),
            compilers: compilers.iter().map(|s| s.to_string()).collect(),
            runtimes: runtimes.iter().map(|s| s.to_string()).collect(),
            remote_language: remote.map(str::to_string),
        };

        let configs = HashMap::from([
            (
                Language::Python,
                entry("python", "py", &[], &["python3", "python"], Some("python")),
            ),
            (
                Language::Java,
                entry("java", "java", &["javac"], &["java"], Some("java")),
            ),
            (
                Language::JavaScript,
                entry("javascript", "js", &[], &["node", "nodejs"], Some("javascript")),
            ),
            (Language::C, entry("c", "c", &["gcc"], &[], Some("c"))),
            (Language::Cpp, entry("cpp", "cpp", &["g++"], &[], Some("cpp"))),
            (Language::Sql, entry("sql", "sql", &[], &[], None)),
        ]);

        Self { configs }
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: Language) -> &LanguageConfig {
        // builtin() seeds every variant and from_json only overwrites
        &self.configs[&language]
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().map(|l| l.to_string()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_language() {
        let manager = LanguageConfigManager::builtin();
        for lang in Language::all_variants() {
            let config = manager.get_config(*lang);
            assert_eq!(config.name, lang.to_string());
        }
        assert_eq!(manager.list_languages().len(), Language::all_variants().len());
    }

    #[test]
    fn test_from_json_overrides_entry() {
        let manager = LanguageConfigManager::from_json(
            r#"{"languages": [{"name": "c++", "file_extension": "cc", "compilers": ["clang++"]}]}"#,
        )
        .unwrap();
        let cpp = manager.get_config(Language::Cpp);
        assert_eq!(cpp.file_extension, "cc");
        assert_eq!(cpp.compilers, vec!["clang++"]);
        assert_eq!(cpp.default_file_stem, "code");
        // untouched entries keep their defaults
        assert_eq!(manager.get_config(Language::Java).compilers, vec!["javac"]);
    }

    #[test]
    fn test_unknown_language_rejected() {
        let result = LanguageConfigManager::from_json(
            r#"{"languages": [{"name": "cobol", "file_extension": "cob"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let manager =
            LanguageConfigManager::load_or_builtin(Path::new("does/not/exist.json")).unwrap();
        assert_eq!(manager.get_config(Language::Python).file_extension, "py");
    }
}
