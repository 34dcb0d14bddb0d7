use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Slack user id of a club member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Staff,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "member" => Ok(Self::Member),
            other => Err(DomainError::InvariantViolation(format!("unknown member role `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub real_name: String,
    pub canonical_name: Option<String>,
    pub name_format_valid: bool,
    pub warning_count: u32,
    pub joined_at: DateTime<Utc>,
    pub last_warning_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub role: Option<MemberRole>,
}

impl Member {
    pub fn joined(
        id: MemberId,
        display_name: impl Into<String>,
        real_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            id,
            canonical_name: canonical_name(&display_name),
            name_format_valid: is_valid_name_format(&display_name),
            display_name,
            real_name: real_name.into(),
            warning_count: 0,
            joined_at: now,
            last_warning_at: None,
            updated_at: now,
            role: Some(MemberRole::Member),
        }
    }

    /// Applies a profile change; validity is always derived from the new display name.
    pub fn rename(
        &mut self,
        display_name: impl Into<String>,
        real_name: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.display_name = display_name.into();
        self.real_name = real_name.into();
        self.derive_name_fields();
        self.updated_at = now;
    }

    /// Recomputes `canonical_name` and `name_format_valid` from `display_name`.
    pub fn derive_name_fields(&mut self) {
        self.canonical_name = canonical_name(&self.display_name);
        self.name_format_valid = is_valid_name_format(&self.display_name);
    }

    /// The only path that raises `warning_count`.
    pub fn record_warning(&mut self, now: DateTime<Utc>) {
        self.warning_count = self.warning_count.saturating_add(1);
        self.last_warning_at = Some(now);
        self.updated_at = now;
    }

    pub fn warned_within(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        self.last_warning_at.map(|at| now - at < cooldown).unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Some(MemberRole::Admin))
    }
}

/// Accepts `이름/학번` display names: 2 to 5 Hangul syllables, a slash, two digits.
pub fn is_valid_name_format(display_name: &str) -> bool {
    let Some((name, cohort)) = display_name.trim().split_once('/') else {
        return false;
    };

    let syllables = name.chars().count();
    (2..=5).contains(&syllables)
        && name.chars().all(is_hangul_syllable)
        && cohort.len() == 2
        && cohort.bytes().all(|byte| byte.is_ascii_digit())
}

fn canonical_name(display_name: &str) -> Option<String> {
    if !is_valid_name_format(display_name) {
        return None;
    }
    display_name.trim().split_once('/').map(|(name, _)| name.to_owned())
}

fn is_hangul_syllable(ch: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&ch)
}
