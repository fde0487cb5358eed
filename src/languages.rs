//! Language configuration for compilation and execution
//!
//! The registry is embedded at build time from `files/languages.toml` and
//! can be overridden at runtime with `SNIPBOX_LANGUAGES=<path>`. Lookups
//! are case-insensitive and cover every declared alias.

use std::collections::HashMap;
use std::fs;
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;
use tracing::{error, warn};

/// How a backend extracts compile diagnostics for a language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticsMode {
    /// Toolchain emits machine-readable JSON diagnostics
    Structured,
    /// Plain text output, best-effort line extraction
    Plain,
}

/// How the preparer turns a snippet into a complete program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapMode {
    /// Bare statements/items need a synthetic `main` shell
    BracedMain,
    /// Any snippet is already a complete program
    None,
}

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Canonical registry key (e.g., "rust")
    pub key: String,
    /// Name of the source file (e.g., "main.rs")
    pub source_file: String,
    /// Compile command (None if not needed)
    pub compile_command: Option<Vec<String>>,
    /// Run command
    pub run_command: Vec<String>,
    /// Diagnostic extraction mode
    pub diagnostics: DiagnosticsMode,
    /// Snippet wrapping strategy
    pub wrap: WrapMode,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    compile_command: Option<String>,
    run_command: String,
    diagnostics: DiagnosticsMode,
    wrap: WrapMode,
    #[serde(default)]
    aliases: Vec<String>,
}

const EMBEDDED_LANGUAGES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// Global language configurations
static LANGUAGES: OnceLock<HashMap<String, LanguageConfig>> = OnceLock::new();

/// Parse a TOML language table into the lookup map (canonical keys plus
/// aliases, all lower-cased).
fn parse_languages(content: &str) -> anyhow::Result<HashMap<String, LanguageConfig>> {
    let raw_configs: HashMap<String, RawLanguageConfig> =
        toml::from_str(content).context("Invalid language configuration TOML")?;

    let mut languages = HashMap::new();

    for (name, raw) in raw_configs {
        let config = LanguageConfig {
            key: name.to_lowercase(),
            source_file: raw.source_file,
            compile_command: raw.compile_command.map(|cmd| into_command(&cmd)),
            run_command: into_command(&raw.run_command),
            diagnostics: raw.diagnostics,
            wrap: raw.wrap,
        };

        // Add main language name
        languages.insert(name.to_lowercase(), config.clone());

        // Add aliases
        for alias in raw.aliases {
            languages.insert(alias.to_lowercase(), config.clone());
        }
    }

    Ok(languages)
}

fn load_languages() -> HashMap<String, LanguageConfig> {
    let content = match std::env::var("SNIPBOX_LANGUAGES") {
        Ok(path) => match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Failed to read language config {}: {}. Using embedded set",
                    path, e
                );
                EMBEDDED_LANGUAGES.to_string()
            }
        },
        Err(_) => EMBEDDED_LANGUAGES.to_string(),
    };

    match parse_languages(&content) {
        Ok(languages) => languages,
        Err(e) => {
            error!("{:#}. Falling back to embedded set", e);
            parse_languages(EMBEDDED_LANGUAGES).unwrap_or_default()
        }
    }
}

/// Get the global language map, initializing it on first use
pub fn languages() -> &'static HashMap<String, LanguageConfig> {
    LANGUAGES.get_or_init(load_languages)
}

/// Get language configuration by language name or alias
pub fn get_language_config(language: &str) -> Option<LanguageConfig> {
    languages().get(&language.to_lowercase()).cloned()
}

/// Get all supported language names (canonical keys and aliases)
pub fn get_supported_languages() -> Vec<String> {
    let mut names: Vec<String> = languages().keys().cloned().collect();
    names.sort();
    names
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rust]
source_file = "main.rs"
compile_command = "rustc -o main main.rs"
run_command = "./main"
diagnostics = "structured"
wrap = "braced-main"
aliases = ["rs"]

[python]
source_file = "main.py"
compile_command = "python3 -m py_compile main.py"
run_command = "python3 main.py"
diagnostics = "plain"
wrap = "none"
aliases = ["py", "python3"]
"#
        )
        .unwrap();
        file
    }

    #[test]
    fn test_load_languages() {
        let config_file = create_test_config();

        let content = fs::read_to_string(config_file.path()).unwrap();
        let languages = parse_languages(&content).unwrap();

        assert!(languages.contains_key("rust"));
        assert!(languages.contains_key("python"));
        // Aliases resolve to the canonical config
        assert_eq!(languages["rs"].key, "rust");
        assert_eq!(languages["py"].key, "python");
        assert_eq!(languages["python3"].key, "python");
    }

    #[test]
    fn test_command_split_and_modes() {
        let config_file = create_test_config();

        let content = fs::read_to_string(config_file.path()).unwrap();
        let languages = parse_languages(&content).unwrap();

        let rust = &languages["rust"];
        let compile = rust.compile_command.as_ref().unwrap();
        assert_eq!(compile, &vec!["rustc", "-o", "main", "main.rs"]);
        assert_eq!(rust.run_command, vec!["./main"]);
        assert_eq!(rust.diagnostics, DiagnosticsMode::Structured);
        assert_eq!(rust.wrap, WrapMode::BracedMain);

        let python = &languages["python"];
        assert_eq!(python.diagnostics, DiagnosticsMode::Plain);
        assert_eq!(python.wrap, WrapMode::None);
    }

    #[test]
    fn test_embedded_config_parses() {
        let languages = parse_languages(EMBEDDED_LANGUAGES).unwrap();
        assert!(languages.contains_key("rust"));
        assert!(languages.contains_key("rs"));
        assert!(languages.contains_key("python"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(parse_languages("not valid toml [").is_err());
    }
}
