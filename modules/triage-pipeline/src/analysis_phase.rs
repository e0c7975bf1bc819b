use tracing::{error, info, warn};

use ai_client::{AiError, AiErrorKind, InputPart};
use triage_common::{AnalysisPrompt, AnalysisResult, FetchOutcome, OverallAnalysis, Taxonomy, TicketRecord};

use crate::control::RunHandle;
use crate::events::{RunEvent, RunObserver};
use crate::state::RunState;
use crate::traits::TicketAnalyzer;

/// How an analysis phase ended.
#[derive(Debug)]
pub(crate) enum AnalysisExit {
    Completed,
    Cancelled,
    /// The AI backend cannot continue; carries the error message.
    Fatal(String),
    PayloadTooLarge { token_count: u64, limit: u64 },
}

// ---------------------------------------------------------------------------
// Per-ticket
// ---------------------------------------------------------------------------

/// Analyze each fetched ticket in order. Fetch errors become analysis errors
/// without a model call. A fatal AI error stops the loop; the failing item
/// is not recorded.
pub(crate) async fn per_ticket(
    analyzer: &dyn TicketAnalyzer,
    taxonomy: &Taxonomy,
    handle: &RunHandle,
    observer: &dyn RunObserver,
    state: &mut RunState,
) -> AnalysisExit {
    let total = state.fetched.len();

    for fetch in &state.fetched {
        if !handle.checkpoint().await {
            return AnalysisExit::Cancelled;
        }

        let result = match &fetch.outcome {
            FetchOutcome::Failed { error } => {
                AnalysisResult::failed(fetch.index, &fetch.ticket_id, error.clone())
            }
            FetchOutcome::Fetched { record } => match analyzer.analyze_ticket(record, taxonomy).await {
                Ok(generation) => {
                    state.stats.tokens += generation.usage;
                    AnalysisResult::analyzed(fetch.index, &fetch.ticket_id, generation.value)
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        run_id = %state.run_id,
                        index = fetch.index,
                        ticket_id = %fetch.ticket_id,
                        error = %e,
                        "Fatal AI error, stopping analysis"
                    );
                    return AnalysisExit::Fatal(e.to_string());
                }
                Err(e) => {
                    warn!(index = fetch.index, ticket_id = %fetch.ticket_id, error = %e, "Ticket analysis failed");
                    AnalysisResult::failed(fetch.index, &fetch.ticket_id, e.to_string())
                }
            },
        };

        state.analyzed.push(result);
        let done = handle.record_analyzed();
        observer.on_event(RunEvent::AnalysisProgress { done, total });
    }

    // A cancel that lands during the last call keeps its result but still
    // ends the run as cancelled.
    if handle.is_cancelled() {
        return AnalysisExit::Cancelled;
    }
    AnalysisExit::Completed
}

// ---------------------------------------------------------------------------
// Overall
// ---------------------------------------------------------------------------

/// Upload failures and a missing file are as fatal as a spent retry budget.
fn is_fatal_for_overall(e: &AiError) -> bool {
    e.is_fatal() || e.kind() == AiErrorKind::FileApi
}

pub fn failed_report(message: &str) -> String {
    format!(
        "## Analysis Failed\n\nAn error occurred during the overall analysis:\n\n```\n{message}\n```"
    )
}

/// One model call over the whole dataset. Outside simulate mode the dataset
/// is uploaded first and always deleted before returning.
pub(crate) async fn overall(
    analyzer: &dyn TicketAnalyzer,
    prompt: &AnalysisPrompt,
    dataset_name: &str,
    simulate: bool,
    handle: &RunHandle,
    observer: &dyn RunObserver,
    state: &mut RunState,
) -> AnalysisExit {
    if simulate {
        if !handle.checkpoint().await {
            return AnalysisExit::Cancelled;
        }
        return finish_overall(analyzer, vec![InputPart::text(&prompt.prompt)], handle, observer, state).await;
    }

    let records: Vec<&TicketRecord> = state.fetched.iter().filter_map(|f| f.record()).collect();
    let json = match serde_json::to_string_pretty(&records) {
        Ok(json) => json,
        Err(e) => return AnalysisExit::Fatal(format!("Failed to serialize dataset: {e}")),
    };

    if !handle.checkpoint().await {
        return AnalysisExit::Cancelled;
    }

    match analyzer.upload_dataset(dataset_name, &json).await {
        Ok(file) => state.dataset = Some(file),
        Err(e) => {
            error!(run_id = %state.run_id, error = %e, "Dataset upload failed");
            return AnalysisExit::Fatal(e.to_string());
        }
    }

    let exit = analyze_uploaded(analyzer, prompt, handle, observer, state).await;
    release_dataset(analyzer, state).await;
    exit
}

async fn analyze_uploaded(
    analyzer: &dyn TicketAnalyzer,
    prompt: &AnalysisPrompt,
    handle: &RunHandle,
    observer: &dyn RunObserver,
    state: &mut RunState,
) -> AnalysisExit {
    let Some(file) = state.dataset.as_ref() else {
        return AnalysisExit::Fatal("Dataset was not uploaded".to_string());
    };
    let input = vec![file.as_part(), InputPart::text(&prompt.prompt)];

    if !handle.checkpoint().await {
        return AnalysisExit::Cancelled;
    }

    match analyzer.input_token_limit().await {
        Ok(Some(limit)) => match analyzer.count_tokens(&input).await {
            Ok(token_count) if token_count > limit => {
                warn!(token_count, limit, "Dataset exceeds the model's input token limit");
                return AnalysisExit::PayloadTooLarge { token_count, limit };
            }
            Ok(token_count) => info!(token_count, limit, "Pre-flight token count"),
            Err(e) => warn!(error = %e, "Token count failed, proceeding with analysis"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not read model token limit, skipping pre-flight count"),
    }

    if !handle.checkpoint().await {
        return AnalysisExit::Cancelled;
    }

    finish_overall(analyzer, input, handle, observer, state).await
}

async fn finish_overall(
    analyzer: &dyn TicketAnalyzer,
    input: Vec<InputPart>,
    handle: &RunHandle,
    observer: &dyn RunObserver,
    state: &mut RunState,
) -> AnalysisExit {
    let result = analyzer.analyze_batch(input).await;
    if let Ok(generation) = &result {
        state.stats.tokens += generation.usage;
    }
    if handle.is_cancelled() {
        info!(run_id = %state.run_id, "Run cancelled during overall analysis");
        return AnalysisExit::Cancelled;
    }

    let analysis = match result {
        Ok(generation) => OverallAnalysis {
            text: generation.value,
            succeeded: true,
        },
        Err(e) if is_fatal_for_overall(&e) => {
            error!(run_id = %state.run_id, error = %e, "Fatal AI error in overall analysis");
            return AnalysisExit::Fatal(e.to_string());
        }
        Err(e) => {
            warn!(error = %e, "Overall analysis failed");
            OverallAnalysis {
                text: failed_report(&e.to_string()),
                succeeded: false,
            }
        }
    };

    state.overall = Some(analysis);
    let done = handle.record_analyzed();
    observer.on_event(RunEvent::AnalysisProgress { done, total: 1 });
    AnalysisExit::Completed
}

/// Delete the uploaded dataset, if any. Failures are logged only.
pub(crate) async fn release_dataset(analyzer: &dyn TicketAnalyzer, state: &mut RunState) {
    if let Some(file) = state.dataset.take() {
        if let Err(e) = analyzer.delete_dataset(&file).await {
            warn!(name = %file.name, error = %e, "Failed to delete uploaded dataset");
        }
    }
}
