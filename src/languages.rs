//! Language configuration for compilation and execution

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::workspace::{BINARY_NAME, SOURCE_STEM};

/// Configuration for a supported programming language
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageConfig {
    /// Canonical language name (e.g., "cpp")
    pub name: String,
    /// Source file extension, the source is staged as `UserProgram.<extension>`
    pub extension: String,
    /// Compile command template (None if not needed)
    pub compile_command: Option<String>,
    /// Run command template
    pub run_command: String,
}

impl LanguageConfig {
    /// Name of the staged source file
    pub fn source_file(&self) -> String {
        format!("{}.{}", SOURCE_STEM, self.extension)
    }

    pub fn has_compile_phase(&self) -> bool {
        self.compile_command.is_some()
    }

    /// Expand `{dir}`, `{source}` and `{binary}` for a submission.
    /// Paths are relative to the sandbox workspace root.
    pub fn render(&self, template: &str, submission_id: &str) -> String {
        template
            .replace("{source}", &format!("{}/{}", submission_id, self.source_file()))
            .replace("{binary}", &format!("{}/{}", submission_id, BINARY_NAME))
            .replace("{dir}", submission_id)
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    extension: String,
    compile_command: Option<String>,
    run_command: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Lookup from language tag (name or alias) to its configuration
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: HashMap<String, Arc<LanguageConfig>>,
}

impl LanguageRegistry {
    /// Languages shipped with the judge
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/files/languages.toml"
        )))
    }

    /// Load a language table from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read language config {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> =
            toml::from_str(content).context("Invalid language config")?;

        let mut languages = HashMap::new();

        for (name, raw) in raw_configs {
            if raw.extension.is_empty()
                || !raw.extension.chars().all(|c| c.is_ascii_alphanumeric())
            {
                anyhow::bail!("Invalid extension for {}: {:?}", name, raw.extension);
            }
            if raw.run_command.trim().is_empty() {
                anyhow::bail!("Empty run command for {}", name);
            }

            let config = Arc::new(LanguageConfig {
                name: name.to_lowercase(),
                extension: raw.extension,
                compile_command: raw.compile_command.filter(|cmd| !cmd.trim().is_empty()),
                run_command: raw.run_command,
            });

            // Add main language name
            languages.insert(name.to_lowercase(), Arc::clone(&config));

            // Add aliases
            for alias in raw.aliases {
                languages.insert(alias.to_lowercase(), Arc::clone(&config));
            }
        }

        Ok(Self { languages })
    }

    /// Get language configuration by language name or alias
    pub fn get(&self, language: &str) -> Option<Arc<LanguageConfig>> {
        self.languages.get(&language.to_lowercase()).cloned()
    }

    /// Get all supported language tags
    pub fn supported(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.languages.keys().cloned().collect();
        tags.sort();
        tags
    }
}
