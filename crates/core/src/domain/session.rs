use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn issue(username: impl Into<String>, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            token: ids::generate_session_token(),
            username: username.into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
