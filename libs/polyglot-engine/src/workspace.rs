//! Per-invocation scratch directories.
//!
//! A `Workspace` owns a fresh temporary directory holding one source file and
//! whatever the compiler produces next to it. The directory is removed when
//! the workspace is released or dropped, so every exit path (success,
//! compile failure, timeout, error propagation, panic unwinding) cleans up.

use crate::config::LanguageConfig;
use lazy_static::lazy_static;
use polyglot_common::types::Language;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

lazy_static! {
    static ref PUBLIC_TYPE: Regex = Regex::new(
        r"\bpublic\s+(?:(?:final|abstract|static|sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_$][A-Za-z0-9_$]*)"
    )
    .expect("valid regex");
    static ref ANY_CLASS: Regex =
        Regex::new(r"\bclass\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("valid regex");
}

/// Name of the type a Java compiler expects the file to be named after
pub fn java_type_name(source: &str) -> Option<String> {
    PUBLIC_TYPE
        .captures(source)
        .or_else(|| ANY_CLASS.captures(source))
        .map(|caps| caps[1].to_string())
}

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    source_path: PathBuf,
    stem: String,
}

impl Workspace {
    /// Create a fresh directory and write the source file into it
    pub fn acquire(language: Language, config: &LanguageConfig, source: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("polyglot-{}-", uuid::Uuid::new_v4().simple()))
            .tempdir()?;

        let stem = match language {
            Language::Java => {
                java_type_name(source).unwrap_or_else(|| config.default_file_stem.clone())
            }
            _ => config.default_file_stem.clone(),
        };

        let source_path = dir.path().join(format!("{}.{}", stem, config.file_extension));
        fs::write(&source_path, source)?;

        debug!(
            language = %language,
            path = %source_path.display(),
            source_size = source.len(),
            "Workspace acquired"
        );

        Ok(Self {
            dir,
            source_path,
            stem,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// File name without extension (the Java class name)
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Remove the directory now and report failures
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove workspace");
        } else {
            debug!(path = %path.display(), "Workspace released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageConfigManager;

    #[test]
    fn test_java_type_name_prefers_public_type() {
        let src = "class Helper {}\npublic final class Solution { }";
        assert_eq!(java_type_name(src).as_deref(), Some("Solution"));
    }

    #[test]
    fn test_java_type_name_falls_back_to_any_class() {
        assert_eq!(java_type_name("class Foo {}").as_deref(), Some("Foo"));
        assert_eq!(java_type_name("int x = 1;"), None);
    }

    #[test]
    fn test_java_file_named_after_class() {
        let manager = LanguageConfigManager::builtin();
        let ws = Workspace::acquire(
            Language::Java,
            manager.get_config(Language::Java),
            "public class Main { public static void main(String[] a) {} }",
        )
        .unwrap();
        assert_eq!(ws.stem(), "Main");
        assert!(ws.source_path().ends_with("Main.java"));
        assert!(ws.source_path().exists());
    }

    #[test]
    fn test_generic_name_for_other_languages() {
        let manager = LanguageConfigManager::builtin();
        let ws = Workspace::acquire(
            Language::Python,
            manager.get_config(Language::Python),
            "print(1)",
        )
        .unwrap();
        assert!(ws.source_path().ends_with("code.py"));
        assert_eq!(fs::read_to_string(ws.source_path()).unwrap(), "print(1)");
    }

    #[test]
    fn test_release_removes_directory() {
        let manager = LanguageConfigManager::builtin();
        let ws = Workspace::acquire(Language::C, manager.get_config(Language::C), "int main(){}")
            .unwrap();
        let path = ws.path().to_path_buf();
        fs::write(path.join("a.out"), b"artifact").unwrap();
        ws.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let manager = LanguageConfigManager::builtin();
        let path = {
            let ws = Workspace::acquire(
                Language::JavaScript,
                manager.get_config(Language::JavaScript),
                "console.log(1)",
            )
            .unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
