use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Response;
use tracing::debug;

use super::types::*;
use crate::error::{AiError, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Thin HTTP layer over the Gemini REST API. One call per method, no retries.
pub(crate) struct GeminiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AiError::Config(format!("Invalid Gemini API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/{}/{}:{}",
            self.base_url,
            API_VERSION,
            model_path(model),
            method
        )
    }

    pub async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = self.model_url(model, "generateContent");

        debug!(model, "Gemini generateContent request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn count_tokens(&self, model: &str, request: &CountTokensRequest) -> Result<u64> {
        let url = self.model_url(model, "countTokens");

        debug!(model, "Gemini countTokens request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let counted: CountTokensResponse = check(response).await?.json().await?;
        Ok(counted.total_tokens)
    }

    pub async fn get_model(&self, model: &str) -> Result<WireModel> {
        let url = format!("{}/{}/{}", self.base_url, API_VERSION, model_path(model));

        let response = self
            .http
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn list_models(&self, page_token: Option<&str>) -> Result<ListModelsResponse> {
        let url = format!("{}/{}/models", self.base_url, API_VERSION);

        let mut request = self
            .http
            .get(&url)
            .headers(self.headers()?)
            .query(&[("pageSize", "100")]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Resumable upload in two requests: open a session, then send the bytes
    /// and finalize in one shot.
    pub async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<WireFile> {
        let url = format!("{}/upload/{}/files", self.base_url, API_VERSION);

        debug!(display_name, size = bytes.len(), "Gemini file upload start");

        let start = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: UploadMetadata {
                    display_name: display_name.to_string(),
                },
            })
            .send()
            .await
            .map_err(|e| AiError::FileApi(format!("upload start failed: {e}")))?;

        let start = check(start)
            .await
            .map_err(|e| AiError::FileApi(format!("upload start rejected: {e}")))?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AiError::FileApi("upload session returned no upload URL".into()))?;

        let finish = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AiError::FileApi(format!("upload failed: {e}")))?;

        let finish = check(finish)
            .await
            .map_err(|e| AiError::FileApi(format!("upload rejected: {e}")))?;
        let uploaded: UploadResponse = finish
            .json()
            .await
            .map_err(|e| AiError::FileApi(format!("unreadable upload response: {e}")))?;

        Ok(uploaded.file)
    }

    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let url = format!("{}/{}/{}", self.base_url, API_VERSION, name);

        let response = self
            .http
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| AiError::FileApi(format!("delete failed: {e}")))?;

        check(response)
            .await
            .map_err(|e| AiError::FileApi(format!("delete rejected: {e}")))?;
        Ok(())
    }
}

/// Accept both `gemini-2.0-flash` and `models/gemini-2.0-flash`.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AiError::from_status(status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_is_prefixed_once() {
        assert_eq!(model_path("gemini-2.0-flash"), "models/gemini-2.0-flash");
        assert_eq!(model_path("models/gemini-2.0-flash"), "models/gemini-2.0-flash");
    }

    #[test]
    fn method_url_uses_versioned_path() {
        let client = GeminiClient::new("key").with_base_url("http://localhost:9999/");
        assert_eq!(
            client.model_url("gemini-1.5-pro", "countTokens"),
            "http://localhost:9999/v1beta/models/gemini-1.5-pro:countTokens"
        );
    }

    #[test]
    fn invalid_key_is_config_error() {
        let client = GeminiClient::new("bad\nkey");
        assert!(matches!(client.headers(), Err(AiError::Config(_))));
    }
}
