// Trait seams for the batch controller's two remote collaborators.
//
// TicketFetcher wraps the ticketing backend (ticket lookup + department list).
// TicketAnalyzer wraps the generative-AI backend (per-ticket structured
// analysis, dataset upload/delete, token counting, batch analysis).
//
// Both are object-safe so the controller holds `Arc<dyn ...>` and tests swap
// in MockFetcher / MockAnalyzer from `testing`.

use anyhow::Result;
use async_trait::async_trait;

use ai_client::{AiError, FileHandle, Generation, InputPart};
use freshservice_client::{Department, ExtractionProfile, FreshServiceClient, Ticket};
use triage_common::{Taxonomy, TicketAnalysis, TicketRecord};

// ---------------------------------------------------------------------------
// TicketFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TicketFetcher: Send + Sync {
    /// Look up one ticket. Errors are turned into error-tagged results by
    /// the fetch phase; they never abort the run.
    async fn ticket(&self, ticket_id: &str, profile: ExtractionProfile) -> Result<Ticket>;

    /// Every department, for company name resolution.
    async fn departments(&self) -> Result<Vec<Department>>;
}

#[async_trait]
impl TicketFetcher for FreshServiceClient {
    async fn ticket(&self, ticket_id: &str, profile: ExtractionProfile) -> Result<Ticket> {
        Ok(self.get_ticket(ticket_id, profile).await?)
    }

    async fn departments(&self) -> Result<Vec<Department>> {
        Ok(self.list_departments().await?)
    }
}

// ---------------------------------------------------------------------------
// TicketAnalyzer
// ---------------------------------------------------------------------------

/// AI operations keep the typed `AiError` so the controller can classify
/// failures by kind.
#[async_trait]
pub trait TicketAnalyzer: Send + Sync {
    /// Structured analysis of a single ticket against the taxonomy.
    async fn analyze_ticket(
        &self,
        record: &TicketRecord,
        taxonomy: &Taxonomy,
    ) -> Result<Generation<TicketAnalysis>, AiError>;

    /// Input-token limit of the configured model, when the backend reports one.
    async fn input_token_limit(&self) -> Result<Option<u64>, AiError>;

    /// Upload the serialized dataset as a transient remote file.
    async fn upload_dataset(&self, display_name: &str, json: &str) -> Result<FileHandle, AiError>;

    /// Count tokens for exactly `input`. File parts are counted remotely.
    async fn count_tokens(&self, input: &[InputPart]) -> Result<u64, AiError>;

    /// Free-text analysis over the whole batch.
    async fn analyze_batch(&self, input: Vec<InputPart>) -> Result<Generation<String>, AiError>;

    async fn delete_dataset(&self, handle: &FileHandle) -> Result<(), AiError>;
}
