mod client;
pub(crate) mod types;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AiError, Result};
use crate::retry::RetryPolicy;
use crate::schema::StructuredOutput;
use crate::usage::TokenUsage;
use crate::util::{response_preview, strip_code_blocks};

use client::GeminiClient;
use types::*;

// =============================================================================
// Public types
// =============================================================================

/// One piece of user input: inline text or a previously uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPart {
    Text(String),
    File { uri: String, mime_type: String },
}

impl InputPart {
    pub fn text(text: impl Into<String>) -> Self {
        InputPart::Text(text.into())
    }

    fn to_wire(&self) -> Part {
        match self {
            InputPart::Text(text) => Part::text(text.clone()),
            InputPart::File { uri, mime_type } => Part::file(uri.clone(), mime_type.clone()),
        }
    }
}

/// A transient file held by the Gemini File API. Must be deleted by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}

impl FileHandle {
    pub fn as_part(&self) -> InputPart {
        InputPart::File {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Bare model id without the `models/` prefix.
    pub id: String,
    pub display_name: Option<String>,
    pub input_token_limit: Option<u64>,
    pub output_token_limit: Option<u64>,
}

impl From<WireModel> for ModelInfo {
    fn from(model: WireModel) -> Self {
        Self {
            id: model
                .name
                .strip_prefix("models/")
                .unwrap_or(&model.name)
                .to_string(),
            display_name: model.display_name,
            input_token_limit: model.input_token_limit,
            output_token_limit: model.output_token_limit,
        }
    }
}

/// Output of one successful generation together with what it cost.
#[derive(Debug, Clone)]
pub struct Generation<T> {
    pub value: T,
    pub usage: TokenUsage,
}

// =============================================================================
// Gemini
// =============================================================================

/// How much of an unparseable response is kept in the error.
const RESPONSE_PREVIEW_BYTES: usize = 200;

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: Option<String>,
    retry: RetryPolicy,
    temperature: f32,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            retry: RetryPolicy::default(),
            temperature: 0.2,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AiError::Config("GEMINI_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Structured extraction against `T`'s schema, retried per the policy.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: &str,
        input: Vec<InputPart>,
    ) -> Result<Generation<T>> {
        let request = GenerateRequest::new(input.iter().map(InputPart::to_wire).collect())
            .system(system_prompt)
            .temperature(self.temperature)
            .json_schema(T::gemini_schema());

        let generation = self.generate_with_retry(&request).await?;
        let body = strip_code_blocks(&generation.value);
        let value = serde_json::from_str(body).map_err(|e| {
            AiError::Parse(format!(
                "Failed to deserialize {} response: {e} (got: {})",
                T::type_name(),
                response_preview(body, RESPONSE_PREVIEW_BYTES)
            ))
        })?;

        Ok(Generation {
            value,
            usage: generation.usage,
        })
    }

    /// Free-text generation, retried per the policy.
    pub async fn generate_text(
        &self,
        system_prompt: Option<&str>,
        input: Vec<InputPart>,
    ) -> Result<Generation<String>> {
        let mut request = GenerateRequest::new(input.iter().map(InputPart::to_wire).collect())
            .temperature(self.temperature);
        if let Some(system) = system_prompt {
            request = request.system(system);
        }
        self.generate_with_retry(&request).await
    }

    async fn generate_with_retry(&self, request: &GenerateRequest) -> Result<Generation<String>> {
        let client = self.client();
        self.retry
            .run("generateContent", || async {
                let response = client.generate(&self.model, request).await?;
                read_generation(response)
            })
            .await
    }

    // =========================================================================
    // Token accounting
    // =========================================================================

    /// Count tokens for exactly the input that would be sent. Passing a file
    /// part counts against the already-uploaded file without re-uploading.
    pub async fn count_tokens(&self, input: &[InputPart]) -> Result<u64> {
        let request = CountTokensRequest {
            contents: vec![Content::user(input.iter().map(InputPart::to_wire).collect())],
        };
        let client = self.client();
        let total = self
            .retry
            .run("countTokens", || client.count_tokens(&self.model, &request))
            .await?;
        debug!(model = %self.model, total, "Counted tokens");
        Ok(total)
    }

    pub async fn model_info(&self) -> Result<ModelInfo> {
        Ok(self.client().get_model(&self.model).await?.into())
    }

    /// Every model that supports `generateContent`, across all pages.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let client = self.client();
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = client.list_models(page_token.as_deref()).await?;
            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| {
                        m.supported_generation_methods
                            .iter()
                            .any(|method| method == "generateContent")
                    })
                    .map(ModelInfo::from),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(models)
    }

    // =========================================================================
    // Files
    // =========================================================================

    pub async fn upload_json(&self, display_name: &str, json: &str) -> Result<FileHandle> {
        let mime_type = "application/json";
        let file = self
            .client()
            .upload_file(display_name, mime_type, json.as_bytes().to_vec())
            .await?;
        info!(name = %file.name, display_name, "Uploaded dataset to Gemini File API");
        Ok(FileHandle {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or_else(|| mime_type.to_string()),
        })
    }

    pub async fn delete_file(&self, handle: &FileHandle) -> Result<()> {
        self.client().delete_file(&handle.name).await?;
        info!(name = %handle.name, "Deleted dataset from Gemini File API");
        Ok(())
    }
}

/// Pull the text and usage out of a response, classifying the ways Gemini
/// reports that no usable text came back.
fn read_generation(response: GenerateResponse) -> Result<Generation<String>> {
    let usage = response
        .usage_metadata
        .as_ref()
        .map(TokenUsage::from)
        .unwrap_or_default();

    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AiError::Blocked(reason));
        }
        return Err(AiError::EmptyResponse);
    };

    match candidate.finish_reason.as_deref() {
        Some("MAX_TOKENS") => {
            return Err(AiError::TokenLimitExceeded(format!(
                "response truncated after {} output tokens",
                usage.output
            )))
        }
        Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
            return Err(AiError::Blocked(reason.to_string()))
        }
        _ => {}
    }

    let text = candidate.content.map(|c| c.text()).unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse);
    }

    Ok(Generation { value: text, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> GenerateResponse {
        serde_json::from_str(json).expect("invalid test JSON")
    }

    #[test]
    fn reads_text_and_usage() {
        let generation = read_generation(response(
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":10,"candidatesTokenCount":2}}"#,
        ))
        .unwrap();
        assert_eq!(generation.value, "ok");
        assert_eq!(generation.usage, TokenUsage::new(10, 2));
    }

    #[test]
    fn max_tokens_is_token_limit_exceeded() {
        let err = read_generation(response(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"partial"}]},"finishReason":"MAX_TOKENS"}],
                "usageMetadata":{"promptTokenCount":10,"candidatesTokenCount":8192}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, AiError::TokenLimitExceeded(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn prompt_block_is_reported() {
        let err = read_generation(response(
            r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, AiError::Blocked(reason) if reason == "SAFETY"));
    }

    #[test]
    fn blank_text_is_empty_response() {
        let err = read_generation(response(
            r#"{"candidates":[{"content":{"parts":[{"text":"  "}]},"finishReason":"STOP"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse));
        assert!(err.is_transient());
    }

    #[test]
    fn model_info_strips_prefix() {
        let info = ModelInfo::from(WireModel {
            name: "models/gemini-1.5-pro".into(),
            display_name: Some("Gemini 1.5 Pro".into()),
            input_token_limit: Some(2_097_152),
            output_token_limit: Some(8192),
            supported_generation_methods: vec!["generateContent".into()],
        });
        assert_eq!(info.id, "gemini-1.5-pro");
        assert_eq!(info.input_token_limit, Some(2_097_152));
    }

    #[test]
    fn file_handle_becomes_file_part() {
        let handle = FileHandle {
            name: "files/abc".into(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc".into(),
            mime_type: "application/json".into(),
        };
        assert_eq!(
            handle.as_part(),
            InputPart::File {
                uri: handle.uri.clone(),
                mime_type: "application/json".into()
            }
        );
    }
}
