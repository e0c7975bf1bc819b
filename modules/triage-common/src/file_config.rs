use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use freshservice_client::ExtractionProfile;

use crate::types::JobMode;

/// TOML-backed run settings. Secrets stay as env vars. Every section is
/// optional so an absent file means defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub taxonomy: TaxonomySection,
    #[serde(default)]
    pub prompts: PromptsSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunSection {
    pub job_mode: JobMode,
    pub extraction_profile: ExtractionProfile,
    /// Pause between successful ticket lookups.
    pub api_delay_ms: u64,
    /// Replace every model call with canned output.
    pub simulate: bool,
    pub model: Option<String>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            job_mode: JobMode::PerTicket,
            extraction_profile: ExtractionProfile::Light,
            api_delay_ms: 200,
            simulate: false,
            model: None,
        }
    }
}

/// Free text, one entry per line or comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TaxonomySection {
    pub modules: String,
    pub use_cases: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PromptsSection {
    /// TOML file with `[[prompts]]` entries for overall analysis.
    pub library: PathBuf,
    /// Per-ticket system prompt template. Built-in template when unset.
    pub per_ticket: Option<PathBuf>,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            library: PathBuf::from("prompts.toml"),
            per_ticket: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheSection {
    pub departments: PathBuf,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            departments: PathBuf::from(".triage/departments.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

impl FileConfig {
    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            load_config(path)
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve a path from the file relative to the directory holding it.
    pub fn resolve_path(config_path: &Path, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            return relative.to_path_buf();
        }
        config_path
            .parent()
            .map(|dir| dir.join(relative))
            .unwrap_or_else(|| relative.to_path_buf())
    }
}
