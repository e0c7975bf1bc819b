//! Department cache: extract prefill, persisted file reuse, corrupt file
//! recovery.

mod common;

use std::sync::Arc;

use common::{controller, per_ticket_config, simulated};
use freshservice_client::Department;
use triage_common::{CompanyCache, TicketRecord, TicketReport, Worklist};
use triage_pipeline::testing::{ticket, ticket_in_department, MockAnalyzer, MockFetcher};
use triage_pipeline::{BatchController, EventLog, PipelineDeps, RunOutcome, RunReport};

fn acme() -> Vec<Department> {
    vec![Department {
        id: 7,
        name: "Acme".to_string(),
    }]
}

fn reports(outcome: RunOutcome) -> Vec<TicketReport> {
    match outcome {
        RunOutcome::Completed(RunReport::PerTicket(reports)) => reports,
        other => panic!("expected a per-ticket report, got {other:?}"),
    }
}

fn with_cache_file(fetcher: Arc<MockFetcher>, path: &std::path::Path) -> BatchController {
    BatchController::new(
        PipelineDeps::builder()
            .fetcher(fetcher)
            .analyzer(Arc::new(MockAnalyzer::new()))
            .observer(Arc::new(EventLog::new()))
            .department_cache(path.to_path_buf())
            .build(),
    )
}

#[tokio::test(start_paused = true)]
async fn extract_names_fill_gaps_for_the_same_department() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("departments.json");

    let mut named = TicketRecord::from_ticket(ticket_in_department(1, 7));
    named.company_name = Some("Acme".to_string());
    let unnamed = TicketRecord::from_ticket(ticket_in_department(2, 7));
    let elsewhere = TicketRecord::from_ticket(ticket(3));
    let worklist = Worklist::from_extract(vec![named, unnamed, elsewhere]);

    let ctl = BatchController::new(
        PipelineDeps::builder()
            .department_cache(cache_path.clone())
            .build(),
    );
    let mut config = simulated(per_ticket_config());
    config.backend = None;

    let reports = reports(ctl.run(worklist, &config).await.unwrap().outcome);

    let names: Vec<&str> = reports.iter().map(|r| r.company_name.as_str()).collect();
    assert_eq!(names, vec!["Acme", "Acme", "N/A"]);
    assert!(!cache_path.exists());
}

#[tokio::test(start_paused = true)]
async fn fresh_department_list_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache").join("departments.json");
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_ticket(ticket_in_department(1, 7))
            .with_departments(acme()),
    );

    let ctl = with_cache_file(fetcher.clone(), &cache_path);
    ctl.run(Worklist::from_ids(["1"]), &per_ticket_config()).await.unwrap();

    assert_eq!(fetcher.department_calls(), 1);
    let saved = CompanyCache::load(&cache_path).unwrap().unwrap();
    assert_eq!(saved.get(7), Some("Acme"));
}

#[tokio::test(start_paused = true)]
async fn persisted_cache_skips_the_department_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("departments.json");
    let mut cached = CompanyCache::new();
    cached.insert(7, "Acme (cached)");
    cached.save(&cache_path).unwrap();

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_ticket(ticket_in_department(1, 7))
            .with_departments(acme()),
    );
    let ctl = with_cache_file(fetcher.clone(), &cache_path);

    let reports = reports(
        ctl.run(Worklist::from_ids(["1"]), &per_ticket_config())
            .await
            .unwrap()
            .outcome,
    );

    assert_eq!(fetcher.department_calls(), 0);
    assert_eq!(reports[0].company_name, "Acme (cached)");
}

#[tokio::test(start_paused = true)]
async fn corrupt_cache_is_replaced_by_a_fresh_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("departments.json");
    std::fs::write(&cache_path, "{ not json").unwrap();

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_ticket(ticket_in_department(1, 7))
            .with_departments(acme()),
    );
    let ctl = with_cache_file(fetcher.clone(), &cache_path);

    let reports = reports(
        ctl.run(Worklist::from_ids(["1"]), &per_ticket_config())
            .await
            .unwrap()
            .outcome,
    );

    assert_eq!(fetcher.department_calls(), 1);
    assert_eq!(reports[0].company_name, "Acme");
    let saved = CompanyCache::load(&cache_path).unwrap().unwrap();
    assert_eq!(saved.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn without_a_cache_file_every_run_refetches_departments() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("departments.json");
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_tickets([1, 2])
            .with_departments(acme()),
    );
    let ctl = controller(fetcher.clone(), Arc::new(MockAnalyzer::new()), Arc::new(EventLog::new()));
    let ctl_persisted = with_cache_file(fetcher.clone(), &cache_path);

    ctl.run(Worklist::from_ids(["1"]), &per_ticket_config()).await.unwrap();
    ctl.run(Worklist::from_ids(["2"]), &per_ticket_config()).await.unwrap();
    assert_eq!(fetcher.department_calls(), 2);

    ctl_persisted.run(Worklist::from_ids(["1"]), &per_ticket_config()).await.unwrap();
    ctl_persisted.run(Worklist::from_ids(["2"]), &per_ticket_config()).await.unwrap();
    assert_eq!(fetcher.department_calls(), 3);
}
