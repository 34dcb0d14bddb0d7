use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::member::MemberId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubEvent {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub options: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ClubEvent {
    /// An event without declared options accepts any response.
    pub fn accepts_response(&self, response: &str) -> bool {
        self.options.is_empty() || self.options.iter().any(|option| option == response)
    }
}

/// One member's answer to one event; later answers overwrite earlier ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    pub event_id: EventId,
    pub member_id: MemberId,
    pub response: String,
    pub responded_at: DateTime<Utc>,
}
