pub mod error;
pub mod types;

pub use error::{FreshServiceError, Result};
pub use types::{Department, ExtractionProfile, Ticket};

use types::{DepartmentPage, TicketEnvelope};

/// Page size for list endpoints. FreshService caps `per_page` at 100.
const PAGE_SIZE: usize = 100;

/// Hard stop for department pagination in case the API keeps returning full pages.
const MAX_DEPARTMENT_PAGES: u32 = 50;

pub struct FreshServiceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FreshServiceClient {
    /// `domain` may be a bare host (`acme.freshservice.com`) or a full URL.
    pub fn new(domain: &str, api_key: String) -> Result<Self> {
        if !is_valid_api_key(&api_key) {
            return Err(FreshServiceError::Config(
                "API key contains invalid characters".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: api_base_url(domain)?,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up one ticket with the associated data selected by `profile`.
    pub async fn get_ticket(&self, ticket_id: &str, profile: ExtractionProfile) -> Result<Ticket> {
        let url = format!("{}/tickets/{}", self.base_url, ticket_id);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.api_key, Some("X"))
            .query(&[("include", profile.include())])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(FreshServiceError::NotFound(ticket_id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FreshServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: TicketEnvelope = resp.json().await?;
        tracing::debug!(ticket_id, %profile, "Fetched ticket");
        Ok(envelope.ticket)
    }

    /// Fetch one page of departments (1-based).
    pub async fn get_departments_page(&self, page: u32) -> Result<Vec<Department>> {
        let url = format!("{}/departments", self.base_url);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.api_key, Some("X"))
            .query(&[("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FreshServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let page: DepartmentPage = resp.json().await?;
        Ok(page.departments)
    }

    /// Every department, walking pages until a short page comes back.
    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        let mut all = Vec::new();
        for page in 1..=MAX_DEPARTMENT_PAGES {
            let batch = self.get_departments_page(page).await?;
            let done = is_last_page(batch.len());
            all.extend(batch);
            if done {
                break;
            }
        }
        tracing::info!(count = all.len(), "Fetched departments");
        Ok(all)
    }
}

/// FreshService keys are plain alphanumeric. Anything else (whitespace,
/// quotes, a pasted `Basic ...` header) means the key was copied wrong.
pub fn is_valid_api_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric())
}

fn api_base_url(domain: &str) -> Result<String> {
    let host = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if host.is_empty() || host.contains(char::is_whitespace) || host.contains('/') {
        return Err(FreshServiceError::Config(format!(
            "invalid FreshService domain: {domain:?}"
        )));
    }
    Ok(format!("https://{host}/api/v2"))
}

fn is_last_page(len: usize) -> bool {
    len < PAGE_SIZE
}
