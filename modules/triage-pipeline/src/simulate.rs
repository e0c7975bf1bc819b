use async_trait::async_trait;

use ai_client::{AiError, FileHandle, Generation, InputPart, TokenUsage};
use triage_common::{Taxonomy, TicketAnalysis, TicketRecord};

use crate::traits::TicketAnalyzer;

pub const DUMMY_PROBLEM_SUMMARY: &str = "DUMMY: Problem summarized by Mock AI.";
pub const DUMMY_PRODUCT_MODULE: &str = "DUMMY: Product Module";
pub const DUMMY_USE_CASE: &str = "DUMMY: Use Case";

/// Canned output for every call. Used when a run is in simulate mode; it
/// never touches the network and reports zero token usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAnalyzer;

pub fn dummy_analysis() -> TicketAnalysis {
    TicketAnalysis {
        problem_summary: DUMMY_PROBLEM_SUMMARY.to_string(),
        product_module: DUMMY_PRODUCT_MODULE.to_string(),
        use_case: DUMMY_USE_CASE.to_string(),
    }
}

pub fn dummy_report(prompt: &str) -> String {
    format!(
        "## DUMMY REPORT (Dummy Mode Enabled)\n\n\
         This is a mock report generated because Dummy Mode is checked. \
         The following text is the user prompt content, which would normally be analyzed by Gemini:\n\n\
         ---\n{prompt}"
    )
}

#[async_trait]
impl TicketAnalyzer for SimulatedAnalyzer {
    async fn analyze_ticket(
        &self,
        _record: &TicketRecord,
        _taxonomy: &Taxonomy,
    ) -> Result<Generation<TicketAnalysis>, AiError> {
        Ok(Generation {
            value: dummy_analysis(),
            usage: TokenUsage::default(),
        })
    }

    async fn input_token_limit(&self) -> Result<Option<u64>, AiError> {
        Ok(None)
    }

    async fn upload_dataset(&self, display_name: &str, _json: &str) -> Result<FileHandle, AiError> {
        Ok(FileHandle {
            name: format!("simulated/{display_name}"),
            uri: String::new(),
            mime_type: "application/json".to_string(),
        })
    }

    async fn count_tokens(&self, _input: &[InputPart]) -> Result<u64, AiError> {
        Ok(0)
    }

    /// The report echoes the text parts of the input.
    async fn analyze_batch(&self, input: Vec<InputPart>) -> Result<Generation<String>, AiError> {
        let prompt = input
            .iter()
            .filter_map(|part| match part {
                InputPart::Text(text) => Some(text.as_str()),
                InputPart::File { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Generation {
            value: dummy_report(&prompt),
            usage: TokenUsage::default(),
        })
    }

    async fn delete_dataset(&self, _handle: &FileHandle) -> Result<(), AiError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshservice_client::Ticket;

    #[tokio::test]
    async fn ticket_analysis_is_fixed() {
        let record = TicketRecord::from_ticket(Ticket::new(1));
        let out = SimulatedAnalyzer
            .analyze_ticket(&record, &Taxonomy::default())
            .await
            .unwrap();
        assert_eq!(out.value, dummy_analysis());
        assert_eq!(out.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn report_carries_prompt() {
        let out = SimulatedAnalyzer
            .analyze_batch(vec![InputPart::text("Find the top issues")])
            .await
            .unwrap();
        assert!(out.value.starts_with("## DUMMY REPORT (Dummy Mode Enabled)"));
        assert!(out.value.ends_with("---\nFind the top issues"));
    }
}
