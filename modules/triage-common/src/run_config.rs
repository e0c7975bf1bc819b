use std::path::Path;
use std::time::Duration;

use typed_builder::TypedBuilder;

use freshservice_client::{is_valid_api_key, ExtractionProfile};

use crate::error::ValidationError;
use crate::prompt_registry::AnalysisPrompt;
use crate::types::JobMode;
use crate::worklist::Worklist;

/// Upload name used when the input has no file name to derive one from.
pub const DEFAULT_DATASET_NAME: &str = "uploaded_data.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCredentials {
    pub domain: String,
    pub api_key: String,
}

/// Controlled vocabulary for per-ticket classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    pub modules: String,
    pub use_cases: String,
}

impl Taxonomy {
    pub fn new(modules: impl Into<String>, use_cases: impl Into<String>) -> Self {
        Self {
            modules: modules.into(),
            use_cases: use_cases.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.modules.trim().is_empty() && !self.use_cases.trim().is_empty()
    }
}

/// Everything one batch run needs besides the worklist.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RunConfig {
    #[builder(default)]
    pub job_mode: JobMode,
    #[builder(default)]
    pub extraction_profile: ExtractionProfile,
    #[builder(default)]
    pub backend: Option<BackendCredentials>,
    #[builder(default)]
    pub gemini_api_key: Option<String>,
    #[builder(default)]
    pub model: Option<String>,
    #[builder(default)]
    pub simulate: bool,
    #[builder(default = Duration::from_millis(200))]
    pub api_delay: Duration,
    #[builder(default)]
    pub taxonomy: Taxonomy,
    #[builder(default)]
    pub prompt: Option<AnalysisPrompt>,
    #[builder(default = DEFAULT_DATASET_NAME.to_string(), setter(into))]
    pub dataset_name: String,
}

impl RunConfig {
    /// Fail fast on the first missing or malformed input. The order of the
    /// checks decides which message the user sees.
    pub fn validate(&self, worklist: &Worklist) -> Result<(), ValidationError> {
        let extract = worklist.is_extract();

        if !extract {
            let backend = self
                .backend
                .as_ref()
                .filter(|b| !b.domain.trim().is_empty() && !b.api_key.is_empty())
                .ok_or(ValidationError::MissingBackendCredentials)?;
            if !is_valid_api_key(&backend.api_key) {
                return Err(ValidationError::MalformedBackendKey);
            }
        }

        if !self.simulate {
            if is_blank(&self.gemini_api_key) {
                return Err(ValidationError::MissingAiCredentials);
            }
            if is_blank(&self.model) {
                return Err(ValidationError::MissingModel);
            }
            if self.job_mode == JobMode::PerTicket && !self.taxonomy.is_complete() {
                return Err(ValidationError::MissingTaxonomy);
            }
        }

        if worklist.is_empty() {
            return Err(ValidationError::EmptyWorklist);
        }
        if !extract && worklist.missing_column() {
            return Err(ValidationError::MissingIdentifierColumn);
        }

        if self.job_mode == JobMode::Overall
            && self
                .prompt
                .as_ref()
                .map_or(true, |p| p.prompt.trim().is_empty())
        {
            return Err(ValidationError::MissingPrompt);
        }

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// `tickets.xlsx` → `tickets.json`.
pub fn dataset_name_for(input: Option<&Path>) -> String {
    input
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|stem| format!("{stem}.json"))
        .unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string())
}
