use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::template::{resolve_vars, validate_template};

/// A named prompt for overall analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPrompt {
    pub id: String,
    pub name: String,
    pub prompt: String,
}

/// The prompts a user can pick from for an overall run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptLibrary {
    #[serde(default)]
    prompts: Vec<AnalysisPrompt>,
}

impl PromptLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt library: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid prompt library: {}", path.display()))
    }

    pub fn parse(toml_str: &str) -> Result<Self> {
        let library: PromptLibrary = toml::from_str(toml_str)?;
        library.validate()?;
        Ok(library)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for prompt in &self.prompts {
            if prompt.id.trim().is_empty() {
                bail!("Prompt with empty id: {:?}", prompt.name);
            }
            if !seen.insert(prompt.id.as_str()) {
                bail!("Duplicate prompt id: {}", prompt.id);
            }
            if prompt.prompt.trim().is_empty() {
                bail!("Prompt {} has no text", prompt.id);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&AnalysisPrompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisPrompt> {
        self.prompts.iter()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

// --- Per-ticket system prompt ---

const TICKET_RUNTIME_VARS: &[&str] = &["modules", "use_cases", "ticket"];

const DEFAULT_TICKET_TEMPLATE: &str = "\
You are a support analyst classifying IT service desk tickets.

Read the ticket JSON supplied by the user, including any conversation thread, and return:
- problem_summary: one or two sentences describing the customer's actual problem.
- product_module: exactly one entry from the product module list below.
- use_case: exactly one entry from the use case list below.

If nothing fits, use \"Other\".

Product modules:
{{modules}}

Use cases:
{{use_cases}}
";

/// System prompt for per-ticket analysis. `{{modules}}` and `{{use_cases}}`
/// come from the run's taxonomy; `{{ticket}}` is the ticket JSON. Templates
/// without `{{ticket}}` get the ticket as a separate user message.
#[derive(Debug, Clone)]
pub struct TicketPromptTemplate {
    template: String,
}

impl Default for TicketPromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TICKET_TEMPLATE.to_string(),
        }
    }
}

impl TicketPromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.trim().is_empty() {
            bail!("Per-ticket prompt template is empty");
        }
        validate_template(&template, TICKET_RUNTIME_VARS)?;
        Ok(Self { template })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read per-ticket prompt: {}", path.display()))?;
        Self::new(content)
            .with_context(|| format!("Template validation failed: {}", path.display()))
    }

    pub fn embeds_ticket(&self) -> bool {
        self.template.contains("{{ticket}}") || self.template.contains("{{ ticket }}")
    }

    pub fn render(&self, modules: &str, use_cases: &str, ticket: &str) -> Result<String> {
        resolve_vars(
            &self.template,
            &HashMap::from([("modules", modules), ("use_cases", use_cases), ("ticket", ticket)]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"
        [[prompts]]
        id = "trends"
        name = "Recurring issues"
        prompt = "List the five most common problems."

        [[prompts]]
        id = "sla"
        name = "SLA risks"
        prompt = "Which tickets are at risk of breaching SLA?"
    "#;

    #[test]
    fn library_lookup() {
        let library = PromptLibrary::parse(LIBRARY).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.get("sla").unwrap().name, "SLA risks");
        assert!(library.get("missing").is_none());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let dup = format!("{LIBRARY}\n[[prompts]]\nid = \"sla\"\nname = \"x\"\nprompt = \"y\"\n");
        let err = PromptLibrary::parse(&dup).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn blank_prompt_text_rejected() {
        assert!(PromptLibrary::parse("[[prompts]]\nid = \"a\"\nname = \"A\"\nprompt = \" \"\n").is_err());
    }

    #[test]
    fn default_template_renders_taxonomy() {
        let template = TicketPromptTemplate::default();
        assert!(!template.embeds_ticket());
        let rendered = template.render("Billing\nReporting", "Refunds", "{}").unwrap();
        assert!(rendered.contains("Billing\nReporting"));
        assert!(rendered.contains("Refunds"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn custom_template_may_only_use_taxonomy_vars() {
        assert!(TicketPromptTemplate::new("Modules: {{modules}}").is_ok());
        let inline = TicketPromptTemplate::new("Classify {{ticket}} into {{modules}}").unwrap();
        assert!(inline.embeds_ticket());
        assert_eq!(
            inline.render("Auth", "", r#"{"id":1}"#).unwrap(),
            r#"Classify {"id":1} into Auth"#
        );
        assert!(TicketPromptTemplate::new("Today is {{today}}").is_err());
        assert!(TicketPromptTemplate::new("   ").is_err());
    }
}
