use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use freshservice_client::Department;

use crate::types::{TicketRecord, UNKNOWN_COMPANY};

/// Department id → company name. Persisted as JSON between runs so
/// departments are only listed once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyCache {
    names: HashMap<u64, String>,
}

impl CompanyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_departments(departments: &[Department]) -> Self {
        let mut cache = Self::new();
        cache.extend_from_departments(departments);
        cache
    }

    pub fn extend_from_departments(&mut self, departments: &[Department]) {
        self.names
            .extend(departments.iter().map(|d| (d.id, d.name.clone())));
    }

    /// Seed from extract records that carry both a department and a name.
    pub fn prefill_from_records<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a TicketRecord>,
    {
        for record in records {
            if let (Some(id), Some(name)) = (record.department_id(), record.company_name()) {
                self.names.insert(id, name.to_string());
            }
        }
    }

    pub fn insert(&mut self, department_id: u64, name: impl Into<String>) {
        self.names.insert(department_id, name.into());
    }

    pub fn get(&self, department_id: u64) -> Option<&str> {
        self.names.get(&department_id).map(String::as_str)
    }

    /// Embedded company name first, then the cache, then `N/A`.
    pub fn resolve(&self, record: &TicketRecord) -> String {
        record
            .company_name()
            .or_else(|| record.department_id().and_then(|id| self.get(id)))
            .unwrap_or(UNKNOWN_COMPANY)
            .to_string()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// `Ok(None)` when nothing has been cached yet. A file that exists but
    /// does not parse is an error; callers discard it and refetch.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read department cache: {}", path.display()))?;
        let cache: CompanyCache = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt department cache: {}", path.display()))?;
        Ok(Some(cache))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write department cache: {}", path.display()))?;
        Ok(())
    }

    /// Remove the persisted cache. Missing files are fine.
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove department cache: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshservice_client::Ticket;

    fn record(department_id: Option<u64>, company: Option<&str>) -> TicketRecord {
        TicketRecord {
            ticket: Ticket::new(1),
            department_id,
            company_name: company.map(str::to_string),
        }
    }

    #[test]
    fn resolution_order() {
        let mut cache = CompanyCache::new();
        cache.insert(10, "Initech");

        assert_eq!(cache.resolve(&record(Some(10), Some("Acme"))), "Acme");
        assert_eq!(cache.resolve(&record(Some(10), None)), "Initech");
        assert_eq!(cache.resolve(&record(Some(11), None)), UNKNOWN_COMPANY);
        assert_eq!(cache.resolve(&record(None, None)), UNKNOWN_COMPANY);
    }

    #[test]
    fn prefill_needs_both_fields() {
        let records = vec![
            record(Some(1), Some("Acme")),
            record(Some(2), None),
            record(None, Some("Orphan")),
        ];
        let mut cache = CompanyCache::new();
        cache.prefill_from_records(&records);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1), Some("Acme"));
    }

    #[test]
    fn persists_round_trip_and_handles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/departments.json");

        assert_eq!(CompanyCache::load(&path).unwrap(), None);

        let cache = CompanyCache::from_departments(&[
            Department { id: 3, name: "Globex".into() },
            Department { id: 4, name: "Umbrella".into() },
        ]);
        cache.save(&path).unwrap();
        let loaded = CompanyCache::load(&path).unwrap().unwrap();
        assert_eq!(loaded, cache);

        CompanyCache::remove(&path).unwrap();
        CompanyCache::remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("departments.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(CompanyCache::load(&path).is_err());
    }
}
