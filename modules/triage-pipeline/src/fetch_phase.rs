use std::time::Duration;

use tracing::{debug, warn};

use freshservice_client::ExtractionProfile;
use triage_common::{FetchResult, TicketRecord, WorkItem};

use crate::control::RunHandle;
use crate::events::{RunEvent, RunObserver};
use crate::traits::TicketFetcher;

/// Look up one work item. Never fails: remote errors become an
/// error-tagged result carrying the original identifier.
pub async fn fetch_one(
    fetcher: &dyn TicketFetcher,
    item: &WorkItem,
    profile: ExtractionProfile,
) -> FetchResult {
    match fetcher.ticket(&item.ticket_id, profile).await {
        Ok(ticket) => {
            debug!(index = item.index, ticket_id = %item.ticket_id, "Fetched ticket");
            FetchResult::fetched(item.index, &item.ticket_id, TicketRecord::from_ticket(ticket))
        }
        Err(e) => {
            warn!(index = item.index, ticket_id = %item.ticket_id, error = %e, "Ticket fetch failed");
            FetchResult::failed(item.index, &item.ticket_id, e.to_string())
        }
    }
}

/// Fetch every item in order, one call at a time. Waits `delay` after each
/// successful lookup; failures move straight on. A cancel is seen after each
/// call and during the delay. Returns false when the run was cancelled;
/// results gathered so far are kept in `out`.
pub(crate) async fn run(
    fetcher: &dyn TicketFetcher,
    items: &[WorkItem],
    profile: ExtractionProfile,
    delay: Duration,
    handle: &RunHandle,
    observer: &dyn RunObserver,
    out: &mut Vec<FetchResult>,
) -> bool {
    let total = items.len();

    for item in items {
        if !handle.checkpoint().await {
            return false;
        }

        let result = fetch_one(fetcher, item, profile).await;
        let failed = result.is_error();
        out.push(result);

        let done = handle.record_fetched();
        observer.on_event(RunEvent::FetchProgress { done, total });

        if handle.is_cancelled() {
            return false;
        }
        if !failed && !delay.is_zero() && !handle.sleep(delay).await {
            return false;
        }
    }

    !handle.is_cancelled()
}
