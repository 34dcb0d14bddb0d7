use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    MemberJoined,
    ProfileUpdated,
    NameWarningSent,
    SuggestionSubmitted,
    SuggestionStatusChanged,
    RsvpRecorded,
    SubmissionReceived,
    DepositReceived,
    PaymentMatched,
    DashboardLogin,
}

/// Append-only record of something that happened in the club workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: ActivityId,
    pub activity_type: ActivityType,
    pub actor_id: String,
    pub target_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn record(
        activity_type: ActivityType,
        actor_id: impl Into<String>,
        target_id: Option<String>,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityId(ids::generate_sortable_id("log", now)),
            activity_type,
            actor_id: actor_id.into(),
            target_id,
            details,
            created_at: now,
        }
    }
}
