use std::path::Path;

use tracing::{info, warn};

use triage_common::{CompanyCache, WorkItem};

use crate::traits::TicketFetcher;

/// Build the company-name cache for a run.
///
/// Extracts never read the persisted cache; names come from the records
/// themselves. Otherwise the persisted cache is used when present, and the
/// department list is fetched (and persisted) when it is not. A failed
/// fetch leaves the cache empty and the run carries on.
pub(crate) async fn prepare_cache(
    items: &[WorkItem],
    extract: bool,
    fetcher: Option<&dyn TicketFetcher>,
    persisted: Option<&Path>,
) -> CompanyCache {
    if extract {
        let mut cache = CompanyCache::new();
        cache.prefill_from_records(items.iter().filter_map(|item| item.record.as_ref()));
        info!(companies = cache.len(), "Company names taken from extract");
        return cache;
    }

    if let Some(path) = persisted {
        match CompanyCache::load(path) {
            Ok(Some(cache)) if !cache.is_empty() => {
                info!(companies = cache.len(), path = %path.display(), "Loaded companies from cache");
                return cache;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Could not parse cached company data, fetching fresh");
                if let Err(e) = CompanyCache::remove(path) {
                    warn!(error = %e, "Failed to clear corrupt department cache");
                }
            }
        }
    }

    let Some(fetcher) = fetcher else {
        return CompanyCache::new();
    };

    match fetcher.departments().await {
        Ok(departments) => {
            let cache = CompanyCache::from_departments(&departments);
            if let Some(path) = persisted {
                if let Err(e) = cache.save(path) {
                    warn!(error = %e, "Failed to persist department cache");
                }
            }
            info!(companies = cache.len(), "Fetched company data from FreshService");
            cache
        }
        Err(e) => {
            warn!(error = %e, "Could not fetch company list; company names will not be available");
            CompanyCache::new()
        }
    }
}
