//! Per-ticket analysis: error propagation, fatal fallback, simulate mode,
//! company resolution and validation, all through BatchController.

mod common;

use std::sync::Arc;
use std::time::Duration;

use ai_client::AiError;
use common::{controller, per_ticket_config, simulated, HandleSlot};
use freshservice_client::Department;
use triage_common::{ValidationError, Worklist};
use triage_pipeline::simulate::dummy_analysis;
use triage_pipeline::testing::{analysis_for, ticket_in_department, MockAnalyzer, MockFetcher, MOCK_USAGE};
use triage_pipeline::{BatchController, EventLog, PipelineDeps, RunEvent, RunOutcome, RunPhase, RunReport};

fn ids(range: std::ops::RangeInclusive<u64>) -> Worklist {
    Worklist::from_ids(range.map(|id| id.to_string()))
}

fn retry_exhausted() -> AiError {
    AiError::RetryExhausted {
        attempts: 3,
        last_error: "503 Service Unavailable".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn completed_run_reports_every_ticket_in_order() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=3));
    let analyzer = Arc::new(MockAnalyzer::new());
    let events = Arc::new(EventLog::new());
    let ctl = controller(fetcher, analyzer.clone(), events.clone());

    let summary = ctl.run(ids(1..=3), &per_ticket_config()).await.unwrap();

    let RunOutcome::Completed(RunReport::PerTicket(reports)) = &summary.outcome else {
        panic!("expected completion, got {:?}", summary.outcome);
    };
    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2", "3"]);
    for report in reports {
        assert_eq!(report.analysis.as_ref(), Some(&analysis_for(&report.ticket_id)));
        assert_eq!(report.priority, Some(2));
        assert_eq!(report.ticket_type.as_deref(), Some("Incident"));
        assert!(report.error.is_none());
    }
    assert_eq!(summary.stats.tickets_analyzed, 3);
    assert_eq!(summary.stats.tokens.input, MOCK_USAGE.input * 3);
    assert!(matches!(events.lifecycle().as_slice(), [RunEvent::Completed(_)]));
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_skip_the_model() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets([1, 3]).on_error("2", "404 Not Found"));
    let analyzer = Arc::new(MockAnalyzer::new());
    let ctl = controller(fetcher, analyzer.clone(), Arc::new(EventLog::new()));

    let summary = ctl.run(ids(1..=3), &per_ticket_config()).await.unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1", "3"]);
    let RunOutcome::Completed(RunReport::PerTicket(reports)) = summary.outcome else {
        panic!("expected completion");
    };
    assert_eq!(reports.len(), 3);
    assert!(reports[1].analysis.is_none());
    assert!(reports[1].error.as_deref().unwrap_or_default().contains("404"));
    assert_eq!(summary.stats.analysis_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn non_fatal_ai_error_is_recorded_and_the_run_continues() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=3));
    let analyzer = Arc::new(MockAnalyzer::new().fail_ticket("2", || AiError::Blocked("SAFETY".into())));
    let ctl = controller(fetcher, analyzer.clone(), Arc::new(EventLog::new()));

    let summary = ctl.run(ids(1..=3), &per_ticket_config()).await.unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2", "3"]);
    let RunOutcome::Completed(RunReport::PerTicket(reports)) = summary.outcome else {
        panic!("expected completion");
    };
    assert!(reports[1].error.as_deref().unwrap_or_default().contains("SAFETY"));
    assert!(reports[2].analysis.is_some());
}

// ---------------------------------------------------------------------------
// Fatal fallback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_stops_analysis_and_keeps_prior_results() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=10));
    let analyzer = Arc::new(MockAnalyzer::new().fail_ticket("5", retry_exhausted));
    let events = Arc::new(EventLog::new());
    let ctl = controller(fetcher, analyzer.clone(), events.clone());

    let summary = ctl.run(ids(1..=10), &per_ticket_config()).await.unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2", "3", "4", "5"]);
    let RunOutcome::FatalFallback { message, partial } = &summary.outcome else {
        panic!("expected fatal fallback, got {:?}", summary.outcome);
    };
    assert!(message.contains("after 3 attempts"));
    assert_eq!(partial.fetched.len(), 10);
    assert_eq!(partial.analyzed.len(), 4);
    assert!(partial.analyzed.iter().all(|a| a.analysis().is_some()));
    assert!(matches!(
        events.lifecycle().as_slice(),
        [RunEvent::FatalFallback { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn token_limit_exceeded_is_fatal_too() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=3));
    let analyzer = Arc::new(
        MockAnalyzer::new().fail_ticket("1", || AiError::TokenLimitExceeded("max tokens".into())),
    );
    let ctl = controller(fetcher, analyzer.clone(), Arc::new(EventLog::new()));

    let summary = ctl.run(ids(1..=3), &per_ticket_config()).await.unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1"]);
    assert!(matches!(summary.outcome, RunOutcome::FatalFallback { .. }));
}

// ---------------------------------------------------------------------------
// Simulate mode
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn simulate_never_calls_the_analyzer() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=4));
    let analyzer = Arc::new(MockAnalyzer::new());
    let ctl = controller(fetcher.clone(), analyzer.clone(), Arc::new(EventLog::new()));

    let summary = ctl.run(ids(1..=4), &simulated(per_ticket_config())).await.unwrap();

    assert!(analyzer.calls().is_empty());
    assert_eq!(fetcher.calls().len(), 4);
    let RunOutcome::Completed(RunReport::PerTicket(reports)) = summary.outcome else {
        panic!("expected completion");
    };
    assert!(reports.iter().all(|r| r.analysis == Some(dummy_analysis())));
    assert_eq!(summary.stats.tokens.total(), 0);
    assert!(summary.stats.simulated);
}

#[tokio::test(start_paused = true)]
async fn simulate_needs_no_analyzer_at_all() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets([1]));
    let ctl = BatchController::new(PipelineDeps::builder().fetcher(fetcher).build());

    let summary = ctl.run(ids(1..=1), &simulated(per_ticket_config())).await.unwrap();
    assert!(summary.outcome.is_completed());
}

// ---------------------------------------------------------------------------
// Company names
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn company_comes_from_the_department_list() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_ticket(ticket_in_department(1, 7))
            .on_ticket(ticket_in_department(2, 99))
            .with_departments(vec![Department {
                id: 7,
                name: "Acme".to_string(),
            }]),
    );
    let ctl = controller(fetcher.clone(), Arc::new(MockAnalyzer::new()), Arc::new(EventLog::new()));

    let summary = ctl.run(ids(1..=2), &per_ticket_config()).await.unwrap();

    assert_eq!(fetcher.department_calls(), 1);
    let RunOutcome::Completed(RunReport::PerTicket(reports)) = summary.outcome else {
        panic!("expected completion");
    };
    assert_eq!(reports[0].company_name, "Acme");
    assert_eq!(reports[1].company_name, "N/A");
}

#[tokio::test(start_paused = true)]
async fn department_fetch_failure_does_not_abort_the_run() {
    let fetcher = Arc::new(MockFetcher::new().on_ticket(ticket_in_department(1, 7)));
    let ctl = controller(fetcher, Arc::new(MockAnalyzer::new()), Arc::new(EventLog::new()));

    let summary = ctl.run(ids(1..=1), &per_ticket_config()).await.unwrap();

    let RunOutcome::Completed(RunReport::PerTicket(reports)) = summary.outcome else {
        panic!("expected completion");
    };
    assert_eq!(reports[0].company_name, "N/A");
}

// ---------------------------------------------------------------------------
// Nothing to analyze / validation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn all_fetches_failing_means_no_valid_data() {
    let fetcher = Arc::new(MockFetcher::new());
    let analyzer = Arc::new(MockAnalyzer::new());
    let events = Arc::new(EventLog::new());
    let ctl = controller(fetcher.clone(), analyzer.clone(), events.clone());

    let summary = ctl.run(ids(1..=3), &per_ticket_config()).await.unwrap();

    assert_eq!(fetcher.calls().len(), 3);
    assert_eq!(summary.outcome, RunOutcome::NoValidData);
    assert!(analyzer.calls().is_empty());
    assert_eq!(events.lifecycle(), vec![RunEvent::NoValidData]);
}

#[tokio::test(start_paused = true)]
async fn invalid_config_makes_no_calls() {
    let fetcher = Arc::new(MockFetcher::new().with_tickets([1]));
    let analyzer = Arc::new(MockAnalyzer::new());
    let events = Arc::new(EventLog::new());
    let ctl = controller(fetcher.clone(), analyzer.clone(), events.clone());

    let mut config = per_ticket_config();
    config.backend = None;
    let err = ctl.run(ids(1..=1), &config).await.unwrap_err();
    assert_eq!(err, ValidationError::MissingBackendCredentials);

    let mut config = per_ticket_config();
    config.taxonomy = Default::default();
    let err = ctl.run(ids(1..=1), &config).await.unwrap_err();
    assert_eq!(err, ValidationError::MissingTaxonomy);

    let err = ctl
        .run(Worklist::from_ids(Vec::<String>::new()), &per_ticket_config())
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::EmptyWorklist);

    assert!(fetcher.calls().is_empty());
    assert_eq!(fetcher.department_calls(), 0);
    assert!(analyzer.calls().is_empty());
    assert!(events.events().is_empty());
}

// ---------------------------------------------------------------------------
// Pause / cancel during analysis
// ---------------------------------------------------------------------------

fn cancel_on(slot: &HandleSlot, label: &'static str) -> MockAnalyzer {
    let hook = slot.clone();
    MockAnalyzer::new().on_call(move |call| {
        if call == label {
            hook.cancel();
        }
    })
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_analysis_keeps_finished_results() {
    let slot = HandleSlot::default();
    let analyzer = Arc::new(cancel_on(&slot, "analyze:2"));
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=5));
    let events = Arc::new(EventLog::new());
    let ctl = controller(fetcher, analyzer.clone(), events.clone());
    slot.set(ctl.handle());

    let summary = ctl.run(ids(1..=5), &per_ticket_config()).await.unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2"]);
    let RunOutcome::Cancelled { partial } = &summary.outcome else {
        panic!("expected cancel, got {:?}", summary.outcome);
    };
    assert_eq!(partial.fetched.len(), 5);
    let analyzed: Vec<&str> = partial.analyzed.iter().map(|a| a.ticket_id.as_str()).collect();
    assert_eq!(analyzed, vec!["1", "2"]);
    assert_eq!(events.lifecycle(), vec![RunEvent::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_the_last_call_is_still_a_cancel() {
    let slot = HandleSlot::default();
    let analyzer = Arc::new(cancel_on(&slot, "analyze:3"));
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=3));
    let events = Arc::new(EventLog::new());
    let ctl = controller(fetcher, analyzer.clone(), events.clone());
    slot.set(ctl.handle());

    let summary = ctl.run(ids(1..=3), &per_ticket_config()).await.unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2", "3"]);
    let RunOutcome::Cancelled { partial } = &summary.outcome else {
        panic!("expected cancel, got {:?}", summary.outcome);
    };
    assert_eq!(partial.analyzed.len(), 3);
    assert_eq!(events.lifecycle(), vec![RunEvent::Cancelled]);
    assert_eq!(ctl.handle().phase(), RunPhase::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn pause_mid_analysis_then_resume_analyzes_each_ticket_once() {
    let slot = HandleSlot::default();
    let hook = slot.clone();
    let analyzer = Arc::new(MockAnalyzer::new().on_call(move |call| {
        if call == "analyze:2" {
            hook.pause();
        }
    }));
    let fetcher = Arc::new(MockFetcher::new().with_tickets(1..=5));
    let ctl = Arc::new(controller(fetcher, analyzer.clone(), Arc::new(EventLog::new())));
    let handle = ctl.handle();
    slot.set(handle.clone());

    let run = ctl.clone().start(ids(1..=5), per_ticket_config());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(handle.is_paused());
    assert_eq!(handle.phase(), RunPhase::Analyzing);
    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2"]);
    assert_eq!(handle.analyzed(), 2);

    handle.resume();
    let summary = run.await.unwrap().unwrap();

    assert_eq!(analyzer.analyzed_ids(), vec!["1", "2", "3", "4", "5"]);
    let RunOutcome::Completed(RunReport::PerTicket(reports)) = summary.outcome else {
        panic!("expected completion");
    };
    let order: Vec<&str> = reports.iter().map(|r| r.ticket_id.as_str()).collect();
    assert_eq!(order, vec!["1", "2", "3", "4", "5"]);
}
