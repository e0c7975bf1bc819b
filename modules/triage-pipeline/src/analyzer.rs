use async_trait::async_trait;
use tracing::debug;

use ai_client::{AiError, FileHandle, Gemini, Generation, InputPart};
use triage_common::{Taxonomy, TicketAnalysis, TicketPromptTemplate, TicketRecord};

use crate::traits::TicketAnalyzer;

/// Gemini-backed analyzer. Per-ticket calls render the system prompt from
/// the template and taxonomy; batch calls send the caller's parts verbatim.
pub struct GeminiAnalyzer {
    gemini: Gemini,
    template: TicketPromptTemplate,
}

impl GeminiAnalyzer {
    pub fn new(gemini: Gemini, template: TicketPromptTemplate) -> Self {
        Self { gemini, template }
    }

    pub fn model(&self) -> &str {
        self.gemini.model()
    }
}

#[async_trait]
impl TicketAnalyzer for GeminiAnalyzer {
    async fn analyze_ticket(
        &self,
        record: &TicketRecord,
        taxonomy: &Taxonomy,
    ) -> Result<Generation<TicketAnalysis>, AiError> {
        let ticket_json = serde_json::to_string_pretty(&record.ticket)?;
        let system = self
            .template
            .render(&taxonomy.modules, &taxonomy.use_cases, &ticket_json)
            .map_err(|e| AiError::Config(format!("per-ticket prompt: {e}")))?;

        let input = if self.template.embeds_ticket() {
            vec![InputPart::text("Analyze the ticket above.")]
        } else {
            vec![InputPart::text(ticket_json)]
        };

        debug!(ticket_id = record.ticket.id, model = self.gemini.model(), "Analyzing ticket");
        self.gemini.extract::<TicketAnalysis>(&system, input).await
    }

    async fn input_token_limit(&self) -> Result<Option<u64>, AiError> {
        Ok(self.gemini.model_info().await?.input_token_limit)
    }

    async fn upload_dataset(&self, display_name: &str, json: &str) -> Result<FileHandle, AiError> {
        self.gemini.upload_json(display_name, json).await
    }

    async fn count_tokens(&self, input: &[InputPart]) -> Result<u64, AiError> {
        self.gemini.count_tokens(input).await
    }

    async fn analyze_batch(&self, input: Vec<InputPart>) -> Result<Generation<String>, AiError> {
        self.gemini.generate_text(None, input).await
    }

    async fn delete_dataset(&self, handle: &FileHandle) -> Result<(), AiError> {
        self.gemini.delete_file(handle).await
    }
}
