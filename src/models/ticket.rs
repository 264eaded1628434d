use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    Bug,
    Feature,
    Improvement,
    Task,
}

/// Workflow status. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    CodeReview,
    Testing,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::CodeReview => "code_review",
            TicketStatus::Testing => "testing",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Lowest,
    Low,
    Medium,
    High,
    Highest,
}

/// The Ticket model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub project_id: String,

    pub title: String,
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub status: TicketStatus,
    pub priority: TicketPriority,

    /// `{PROJECTKEY}-{sequence}`, unique across all projects.
    pub ticket_key: String,
    pub sequence: i64,

    /// Nulled when the reporting user is deleted.
    pub reporter_id: Option<String>,
    pub assignee_id: Option<String>,

    pub photo_url: Option<String>,
    pub video_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters accepted by the ticket listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    pub reporter_id: Option<String>,
    pub status: Option<TicketStatus>,
}

impl TicketFilter {
    pub fn for_project(project_id: &str) -> Self {
        Self { project_id: Some(project_id.to_string()), ..Self::default() }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.project_id.as_deref().map_or(true, |p| ticket.project_id == p)
            && self
                .assignee_id
                .as_deref()
                .map_or(true, |a| ticket.assignee_id.as_deref() == Some(a))
            && self
                .reporter_id
                .as_deref()
                .map_or(true, |r| ticket.reporter_id.as_deref() == Some(r))
            && self.status.map_or(true, |s| ticket.status == s)
    }
}
