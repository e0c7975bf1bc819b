use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::types::{TicketRecord, WorkItem};

/// The input a run works through: identifier rows that still need fetching,
/// or a pre-extracted dataset that skips the fetch phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Worklist {
    /// Spreadsheet-like rows; `column` is a dotted path to the ticket id.
    Rows {
        rows: Vec<Value>,
        column: Option<String>,
    },
    /// Bare identifiers, one per line of a text file.
    Ids(Vec<String>),
    /// Full ticket records.
    Extract(Vec<TicketRecord>),
}

impl Worklist {
    pub fn from_rows(rows: Vec<Value>, column: impl Into<String>) -> Self {
        Worklist::Rows {
            rows,
            column: Some(column.into()),
        }
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Worklist::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn from_extract(records: Vec<TicketRecord>) -> Self {
        Worklist::Extract(records)
    }

    /// Read a JSON array of row objects.
    pub fn load_rows(path: &Path, column: Option<String>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let rows: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("Input file is not a JSON array: {}", path.display()))?;
        Ok(Worklist::Rows { rows, column })
    }

    /// Read a plain text file with one ticket id per line.
    pub fn load_ids(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        Ok(Worklist::from_ids(
            content.lines().map(str::trim).filter(|l| !l.is_empty()),
        ))
    }

    /// Read a JSON array of `{ticket, department_id?, company_name?}` records.
    pub fn load_extract(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read extract file: {}", path.display()))?;
        let records: Vec<TicketRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ticket extract: {}", path.display()))?;
        Ok(Worklist::Extract(records))
    }

    pub fn is_extract(&self) -> bool {
        matches!(self, Worklist::Extract(_))
    }

    /// Number of raw input entries, before identifier clean-up.
    pub fn len(&self) -> usize {
        match self {
            Worklist::Rows { rows, .. } => rows.len(),
            Worklist::Ids(ids) => ids.len(),
            Worklist::Extract(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row input without a usable identifier column.
    pub fn missing_column(&self) -> bool {
        match self {
            Worklist::Rows { column, .. } => column.as_deref().map_or(true, |c| c.trim().is_empty()),
            _ => false,
        }
    }

    /// Turn the input into ordered work items. Identifiers are reduced to
    /// their digits and entries left empty are dropped; `index` is the
    /// position among the surviving items.
    pub fn into_items(self) -> Vec<WorkItem> {
        let ids: Vec<String> = match self {
            Worklist::Extract(records) => {
                return records
                    .into_iter()
                    .enumerate()
                    .map(|(index, record)| WorkItem {
                        index,
                        ticket_id: record.ticket.id.to_string(),
                        record: Some(record),
                    })
                    .collect();
            }
            Worklist::Rows { rows, column } => {
                let column = column.unwrap_or_default();
                rows.iter()
                    .filter_map(|row| lookup_path(row, column.trim()))
                    .map(|value| digits_only(&scalar_to_string(value)))
                    .collect()
            }
            Worklist::Ids(ids) => ids.iter().map(|id| digits_only(id)).collect(),
        };

        ids.into_iter()
            .filter(|id| !id.is_empty())
            .enumerate()
            .map(|(index, ticket_id)| WorkItem {
                index,
                ticket_id,
                record: None,
            })
            .collect()
    }
}

/// Walk a JSON value by dotted path (e.g. `ticket.id`).
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(value, |current, key| current.get(key))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Spreadsheet exports turn ids into things like `#4821` or `4,821.0`.
fn digits_only(raw: &str) -> String {
    let trimmed = raw.trim();
    let integral = match trimmed.split_once('.') {
        Some((whole, frac)) if frac.chars().all(|c| c == '0') => whole,
        _ => trimmed,
    };
    integral.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshservice_client::Ticket;
    use serde_json::json;

    #[test]
    fn rows_use_dotted_column_and_strip_non_digits() {
        let rows = vec![
            json!({"ticket": {"id": 101}}),
            json!({"ticket": {"id": "#102"}}),
            json!({"ticket": {"id": "n/a"}}),
            json!({"other": 5}),
            json!({"ticket": {"id": "INC-103 "}}),
        ];
        let items = Worklist::from_rows(rows, "ticket.id").into_items();
        let ids: Vec<_> = items.iter().map(|i| i.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "103"]);
        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(items.iter().all(|i| i.record.is_none()));
    }

    #[test]
    fn float_ids_from_spreadsheets_keep_their_value() {
        assert_eq!(digits_only("4821.0"), "4821");
        assert_eq!(digits_only("4,821"), "4821");
        assert_eq!(digits_only("12.5"), "125");
    }

    #[test]
    fn extract_ids_come_from_ticket() {
        let records = vec![
            TicketRecord::from_ticket(Ticket::new(7)),
            TicketRecord::from_ticket(Ticket::new(9)),
        ];
        let items = Worklist::from_extract(records).into_items();
        assert_eq!(items[1].ticket_id, "9");
        assert_eq!(items[1].index, 1);
        assert!(items[1].record.is_some());
    }

    #[test]
    fn missing_column_only_applies_to_rows() {
        let rows = Worklist::Rows {
            rows: vec![json!({"id": 1})],
            column: Some("  ".into()),
        };
        assert!(rows.missing_column());
        assert!(!Worklist::from_ids(["1"]).missing_column());
        assert!(!Worklist::from_extract(vec![]).missing_column());
    }

    #[test]
    fn emptiness_counts_raw_rows() {
        assert!(Worklist::from_ids(Vec::<String>::new()).is_empty());
        let rows = Worklist::from_rows(vec![json!({"x": "abc"})], "x");
        assert!(!rows.is_empty());
        assert!(rows.into_items().is_empty());
    }

    #[test]
    fn loads_ids_and_extract_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let ids_path = dir.path().join("ids.txt");
        std::fs::write(&ids_path, "101\n\n 102 \n").unwrap();
        let items = Worklist::load_ids(&ids_path).unwrap().into_items();
        assert_eq!(items.len(), 2);

        let extract_path = dir.path().join("extract.json");
        std::fs::write(
            &extract_path,
            r#"[{"ticket": {"id": 5}, "company_name": "Acme"}]"#,
        )
        .unwrap();
        let worklist = Worklist::load_extract(&extract_path).unwrap();
        assert!(worklist.is_extract());
        assert_eq!(worklist.len(), 1);
    }
}
