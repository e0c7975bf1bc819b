// Test mocks for the batch pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockFetcher (TicketFetcher): HashMap-based id → ticket, with scripted failures
// - MockAnalyzer (TicketAnalyzer): canned analyses, scripted AI errors, call log
//
// Both record every call so tests can assert what was (and was not) issued,
// and accept a hook that runs on each call (used to pause or cancel mid-run).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::time::Instant;

use ai_client::{AiError, FileHandle, Generation, InputPart, TokenUsage};
use freshservice_client::{Department, ExtractionProfile, Ticket};
use triage_common::{Taxonomy, TicketAnalysis, TicketRecord};

use crate::traits::{TicketAnalyzer, TicketFetcher};

type Hook = Box<dyn Fn(&str) + Send + Sync>;
type ErrorFactory = Arc<dyn Fn() -> AiError + Send + Sync>;

/// Usage reported by every successful MockAnalyzer call.
pub const MOCK_USAGE: TokenUsage = TokenUsage { input: 100, output: 20 };

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn ticket(id: u64) -> Ticket {
    let mut ticket = Ticket::new(id);
    ticket.subject = Some(format!("Ticket {id}"));
    ticket.priority = Some(2);
    ticket.status = Some(2);
    ticket.ticket_type = Some("Incident".to_string());
    ticket
}

pub fn ticket_in_department(id: u64, department_id: u64) -> Ticket {
    let mut ticket = ticket(id);
    ticket.department_id = Some(department_id);
    ticket
}

pub fn analysis_for(ticket_id: &str) -> TicketAnalysis {
    TicketAnalysis {
        problem_summary: format!("Summary of {ticket_id}"),
        product_module: "Billing".to_string(),
        use_case: "Refunds".to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Returns registered tickets; unregistered ids fail with a not-found error.
/// Builder pattern: `.on_ticket()`, `.with_tickets()`, `.on_error()`,
/// `.with_departments()`, `.on_call()`.
pub struct MockFetcher {
    tickets: HashMap<String, Ticket>,
    errors: HashMap<String, String>,
    departments: Option<Vec<Department>>,
    hook: Option<Hook>,
    calls: Mutex<Vec<(String, Instant)>>,
    department_calls: Mutex<usize>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            tickets: HashMap::new(),
            errors: HashMap::new(),
            departments: None,
            hook: None,
            calls: Mutex::new(Vec::new()),
            department_calls: Mutex::new(0),
        }
    }

    pub fn on_ticket(mut self, ticket: Ticket) -> Self {
        self.tickets.insert(ticket.id.to_string(), ticket);
        self
    }

    pub fn with_tickets(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        for id in ids {
            self.tickets.insert(id.to_string(), ticket(id));
        }
        self
    }

    pub fn on_error(mut self, ticket_id: &str, message: &str) -> Self {
        self.errors.insert(ticket_id.to_string(), message.to_string());
        self
    }

    pub fn with_departments(mut self, departments: Vec<Department>) -> Self {
        self.departments = Some(departments);
        self
    }

    /// Runs with the ticket id after the call is recorded.
    pub fn on_call(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.calls).iter().map(|(_, at)| *at).collect()
    }

    pub fn department_calls(&self) -> usize {
        *lock(&self.department_calls)
    }
}

#[async_trait]
impl TicketFetcher for MockFetcher {
    async fn ticket(&self, ticket_id: &str, _profile: ExtractionProfile) -> Result<Ticket> {
        lock(&self.calls).push((ticket_id.to_string(), Instant::now()));
        if let Some(hook) = &self.hook {
            hook(ticket_id);
        }
        if let Some(message) = self.errors.get(ticket_id) {
            return Err(anyhow!("{message}"));
        }
        self.tickets
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| anyhow!("Ticket not found: {ticket_id}"))
    }

    async fn departments(&self) -> Result<Vec<Department>> {
        *lock(&self.department_calls) += 1;
        self.departments
            .clone()
            .ok_or_else(|| anyhow!("MockFetcher: departments unavailable"))
    }
}

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

/// Answers every ticket with [`analysis_for`] unless a failure is scripted.
/// Every call is logged as `analyze:<id>`, `limit`, `upload`, `count`,
/// `batch` or `delete`.
pub struct MockAnalyzer {
    ticket_errors: HashMap<String, ErrorFactory>,
    token_limit: Option<u64>,
    token_count: Option<u64>,
    upload_error: Option<ErrorFactory>,
    batch_error: Option<ErrorFactory>,
    batch_text: String,
    hook: Option<Hook>,
    calls: Mutex<Vec<String>>,
    batch_inputs: Mutex<Vec<Vec<InputPart>>>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            ticket_errors: HashMap::new(),
            token_limit: None,
            token_count: None,
            upload_error: None,
            batch_error: None,
            batch_text: "## Overall findings".to_string(),
            hook: None,
            calls: Mutex::new(Vec::new()),
            batch_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_ticket(
        mut self,
        ticket_id: &str,
        error: impl Fn() -> AiError + Send + Sync + 'static,
    ) -> Self {
        self.ticket_errors.insert(ticket_id.to_string(), Arc::new(error));
        self
    }

    pub fn with_token_limit(mut self, limit: u64) -> Self {
        self.token_limit = Some(limit);
        self
    }

    /// Result of `count_tokens`. Unset means counting fails.
    pub fn with_token_count(mut self, count: u64) -> Self {
        self.token_count = Some(count);
        self
    }

    pub fn fail_upload(mut self, error: impl Fn() -> AiError + Send + Sync + 'static) -> Self {
        self.upload_error = Some(Arc::new(error));
        self
    }

    pub fn fail_batch(mut self, error: impl Fn() -> AiError + Send + Sync + 'static) -> Self {
        self.batch_error = Some(Arc::new(error));
        self
    }

    pub fn with_batch_text(mut self, text: &str) -> Self {
        self.batch_text = text.to_string();
        self
    }

    /// Runs with the call label (`analyze:<id>`, `upload`, ...) after logging.
    pub fn on_call(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count_of(&self, label: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == label).count()
    }

    pub fn analyzed_ids(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| c.strip_prefix("analyze:").map(str::to_string))
            .collect()
    }

    pub fn batch_inputs(&self) -> Vec<Vec<InputPart>> {
        lock(&self.batch_inputs).clone()
    }

    fn record(&self, label: String) {
        lock(&self.calls).push(label.clone());
        if let Some(hook) = &self.hook {
            hook(&label);
        }
    }
}

#[async_trait]
impl TicketAnalyzer for MockAnalyzer {
    async fn analyze_ticket(
        &self,
        record: &TicketRecord,
        _taxonomy: &Taxonomy,
    ) -> Result<Generation<TicketAnalysis>, AiError> {
        let id = record.ticket.id.to_string();
        self.record(format!("analyze:{id}"));
        if let Some(error) = self.ticket_errors.get(&id) {
            return Err(error());
        }
        Ok(Generation {
            value: analysis_for(&id),
            usage: MOCK_USAGE,
        })
    }

    async fn input_token_limit(&self) -> Result<Option<u64>, AiError> {
        self.record("limit".to_string());
        Ok(self.token_limit)
    }

    async fn upload_dataset(&self, display_name: &str, _json: &str) -> Result<FileHandle, AiError> {
        self.record("upload".to_string());
        if let Some(error) = &self.upload_error {
            return Err(error());
        }
        Ok(FileHandle {
            name: format!("files/{display_name}"),
            uri: format!("https://files.test/{display_name}"),
            mime_type: "application/json".to_string(),
        })
    }

    async fn count_tokens(&self, _input: &[InputPart]) -> Result<u64, AiError> {
        self.record("count".to_string());
        self.token_count
            .ok_or_else(|| AiError::Api { status: 500, message: "count failed".to_string() })
    }

    async fn analyze_batch(&self, input: Vec<InputPart>) -> Result<Generation<String>, AiError> {
        self.record("batch".to_string());
        lock(&self.batch_inputs).push(input);
        if let Some(error) = &self.batch_error {
            return Err(error());
        }
        Ok(Generation {
            value: self.batch_text.clone(),
            usage: MOCK_USAGE,
        })
    }

    async fn delete_dataset(&self, _handle: &FileHandle) -> Result<(), AiError> {
        self.record("delete".to_string());
        Ok(())
    }
}
