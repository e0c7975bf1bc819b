//! Pure merge of fetch and analysis results into reportable records.

use std::collections::HashMap;

use triage_common::{
    AnalysisPrompt, AnalysisResult, CompanyCache, FetchResult, OverallAnalysis, OverallReport,
    TicketReport, UNKNOWN_COMPANY,
};

/// Identifying fields of one fetched ticket, without analysis.
fn base_report(fetch: &FetchResult, cache: &CompanyCache) -> TicketReport {
    match fetch.record() {
        Some(record) => TicketReport {
            ticket_id: fetch.ticket_id.clone(),
            priority: record.ticket.priority,
            status: record.ticket.status,
            ticket_type: record.ticket.ticket_type.clone(),
            company_name: cache.resolve(record),
            analysis: None,
            error: None,
        },
        None => TicketReport {
            ticket_id: fetch.ticket_id.clone(),
            priority: None,
            status: None,
            ticket_type: None,
            company_name: UNKNOWN_COMPANY.to_string(),
            analysis: None,
            error: fetch.error().map(str::to_string),
        },
    }
}

/// One record per analysis result, joined to its fetch result by worklist
/// index. Analysis errors take precedence over fetch data.
pub fn merge_per_ticket(
    fetched: &[FetchResult],
    analyzed: &[AnalysisResult],
    cache: &CompanyCache,
) -> Vec<TicketReport> {
    let by_index: HashMap<usize, &FetchResult> = fetched.iter().map(|f| (f.index, f)).collect();

    analyzed
        .iter()
        .map(|result| {
            let mut report = match by_index.get(&result.index) {
                Some(fetch) => base_report(fetch, cache),
                None => TicketReport {
                    ticket_id: result.ticket_id.clone(),
                    priority: None,
                    status: None,
                    ticket_type: None,
                    company_name: UNKNOWN_COMPANY.to_string(),
                    analysis: None,
                    error: None,
                },
            };
            match result.analysis() {
                Some(analysis) => report.analysis = Some(analysis.clone()),
                None => report.error = result.error().map(str::to_string),
            }
            report
        })
        .collect()
}

/// The consolidated report plus every ticket that went into it.
pub fn merge_overall(
    prompt: &AnalysisPrompt,
    analysis: OverallAnalysis,
    fetched: &[FetchResult],
    cache: &CompanyCache,
) -> OverallReport {
    OverallReport {
        prompt_id: prompt.id.clone(),
        prompt_name: prompt.name.clone(),
        report: analysis.text,
        succeeded: analysis.succeeded,
        tickets: fetched
            .iter()
            .filter(|f| !f.is_error())
            .map(|f| base_report(f, cache))
            .collect(),
    }
}
