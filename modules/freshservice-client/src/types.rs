use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Extraction profiles ---

/// How much associated data to pull with each ticket lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionProfile {
    /// Ticket fields plus requester and SLA stats.
    #[default]
    Light,
    /// Adds the full conversation thread and linked assets. Slower and
    /// heavier on the rate limit.
    Extended,
}

impl ExtractionProfile {
    /// Value for the `include` query parameter.
    pub fn include(&self) -> &'static str {
        match self {
            ExtractionProfile::Light => "requester,stats",
            ExtractionProfile::Extended => "conversations,requester,requested_for,stats,assets",
        }
    }
}

impl fmt::Display for ExtractionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionProfile::Light => write!(f, "light"),
            ExtractionProfile::Extended => write!(f, "extended"),
        }
    }
}

impl FromStr for ExtractionProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ExtractionProfile::Light),
            "extended" => Ok(ExtractionProfile::Extended),
            other => Err(format!("unknown extraction profile: {other}")),
        }
    }
}

// --- Tickets ---

/// A FreshService ticket. Known fields are typed; everything else the API
/// returns (description, conversations, requester, stats...) is kept
/// verbatim in `extra` so it can be handed to the analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Ticket {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            subject: None,
            priority: None,
            status: None,
            ticket_type: None,
            department_id: None,
            created_at: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn priority_label(&self) -> Option<&'static str> {
        match self.priority? {
            1 => Some("Low"),
            2 => Some("Medium"),
            3 => Some("High"),
            4 => Some("Urgent"),
            _ => None,
        }
    }

    pub fn status_label(&self) -> Option<&'static str> {
        match self.status? {
            2 => Some("Open"),
            3 => Some("Pending"),
            4 => Some("Resolved"),
            5 => Some("Closed"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TicketEnvelope {
    pub ticket: Ticket,
}

// --- Departments ---

/// A FreshService department. Company names shown in reports come from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DepartmentPage {
    #[serde(default)]
    pub departments: Vec<Department>,
}
