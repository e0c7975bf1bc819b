use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use freshservice_client::Ticket;

/// Shown wherever a company/department name cannot be resolved.
pub const UNKNOWN_COMPANY: &str = "N/A";

// =============================================================================
// Job mode
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobMode {
    /// One analysis per ticket.
    #[default]
    PerTicket,
    /// One consolidated analysis over the whole batch.
    Overall,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::PerTicket => write!(f, "per-ticket"),
            JobMode::Overall => write!(f, "overall"),
        }
    }
}

impl FromStr for JobMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-ticket" | "perticket" | "per_ticket" => Ok(JobMode::PerTicket),
            "overall" => Ok(JobMode::Overall),
            other => Err(format!("unknown job mode: {other}")),
        }
    }
}

// =============================================================================
// Ticket records
// =============================================================================

/// Ticket detail as it enters the analysis step, either fetched live or
/// read from a pre-extracted dataset. Extracts may carry the department
/// and company name alongside the ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket: Ticket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl TicketRecord {
    pub fn from_ticket(ticket: Ticket) -> Self {
        Self {
            department_id: ticket.department_id,
            ticket,
            company_name: None,
        }
    }

    /// Record-level department wins over the one nested in the ticket.
    pub fn department_id(&self) -> Option<u64> {
        self.department_id.or(self.ticket.department_id)
    }

    /// Embedded company name, ignoring blanks.
    pub fn company_name(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// One entry of the worklist. `index` is the position in the original input
/// and is the correlation key carried through every later stage.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub index: usize,
    pub ticket_id: String,
    /// Present when the input was a full extract.
    pub record: Option<TicketRecord>,
}

// =============================================================================
// Fetch results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Fetched { record: TicketRecord },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub index: usize,
    pub ticket_id: String,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn fetched(index: usize, ticket_id: impl Into<String>, record: TicketRecord) -> Self {
        Self {
            index,
            ticket_id: ticket_id.into(),
            outcome: FetchOutcome::Fetched { record },
        }
    }

    pub fn failed(index: usize, ticket_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            ticket_id: ticket_id.into(),
            outcome: FetchOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn record(&self) -> Option<&TicketRecord> {
        match &self.outcome {
            FetchOutcome::Fetched { record } => Some(record),
            FetchOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Fetched { .. } => None,
            FetchOutcome::Failed { error } => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }
}

// =============================================================================
// Analysis results
// =============================================================================

/// Structured per-ticket analysis returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TicketAnalysis {
    /// One or two sentences describing the customer's problem.
    pub problem_summary: String,
    /// Product module from the supplied vocabulary.
    pub product_module: String,
    /// Use case from the supplied vocabulary.
    pub use_case: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed { analysis: TicketAnalysis },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub index: usize,
    pub ticket_id: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
}

impl AnalysisResult {
    pub fn analyzed(index: usize, ticket_id: impl Into<String>, analysis: TicketAnalysis) -> Self {
        Self {
            index,
            ticket_id: ticket_id.into(),
            outcome: AnalysisOutcome::Analyzed { analysis },
        }
    }

    pub fn failed(index: usize, ticket_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            ticket_id: ticket_id.into(),
            outcome: AnalysisOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn analysis(&self) -> Option<&TicketAnalysis> {
        match &self.outcome {
            AnalysisOutcome::Analyzed { analysis } => Some(analysis),
            AnalysisOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AnalysisOutcome::Analyzed { .. } => None,
            AnalysisOutcome::Failed { error } => Some(error),
        }
    }
}

/// The single result of an overall-mode run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallAnalysis {
    /// Markdown report, or an "Analysis Failed" block when `succeeded` is false.
    pub text: String,
    pub succeeded: bool,
}

// =============================================================================
// Reportable records
// =============================================================================

/// One row of the final per-ticket report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketReport {
    pub ticket_id: String,
    pub priority: Option<i64>,
    pub status: Option<i64>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub company_name: String,
    #[serde(flatten)]
    pub analysis: Option<TicketAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final output of an overall-mode run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallReport {
    pub prompt_id: String,
    pub prompt_name: String,
    pub report: String,
    pub succeeded: bool,
    pub tickets: Vec<TicketReport>,
}
