use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::ids;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    Facility,
    Event,
    Operation,
    Other,
}

impl SuggestionCategory {
    pub const ALL: [Self; 4] = [Self::Facility, Self::Event, Self::Operation, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facility => "facility",
            Self::Event => "event",
            Self::Operation => "operation",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Facility => "시설",
            Self::Event => "행사",
            Self::Operation => "운영",
            Self::Other => "기타",
        }
    }
}

impl std::str::FromStr for SuggestionCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|category| category.as_str() == value.trim()).ok_or_else(|| {
            DomainError::InvariantViolation(format!("unknown suggestion category `{value}`"))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    InReview,
    Resolved,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pending" => Ok(Self::Pending),
            "in_review" => Ok(Self::InReview),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown suggestion status `{other}`"
            ))),
        }
    }
}

/// Anonymous member feedback. No author is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: SuggestionId,
    pub category: SuggestionCategory,
    pub title: String,
    pub content: String,
    pub status: SuggestionStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn submit(
        category: SuggestionCategory,
        title: impl Into<String>,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let title = title.into().trim().to_owned();
        let content = content.into().trim().to_owned();
        if title.is_empty() || content.is_empty() {
            return Err(DomainError::InvariantViolation(
                "suggestion title and content are required".to_owned(),
            ));
        }

        Ok(Self {
            id: SuggestionId(ids::generate_id("sug")),
            category,
            title,
            content,
            status: SuggestionStatus::Pending,
            admin_note: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        matches!(
            (self.status, next),
            (SuggestionStatus::Pending, SuggestionStatus::InReview)
                | (SuggestionStatus::Pending, SuggestionStatus::Resolved)
                | (SuggestionStatus::Pending, SuggestionStatus::Rejected)
                | (SuggestionStatus::InReview, SuggestionStatus::Resolved)
                | (SuggestionStatus::InReview, SuggestionStatus::Rejected)
        )
    }

    pub fn transition(
        &mut self,
        next: SuggestionStatus,
        admin_note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidSuggestionTransition { from: self.status, to: next });
        }

        self.status = next;
        if let Some(note) = admin_note.map(|note| note.trim().to_owned()) {
            if !note.is_empty() {
                self.admin_note = Some(note);
            }
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Suggestion, SuggestionCategory, SuggestionStatus};
    use crate::errors::DomainError;

    fn pending() -> Suggestion {
        Suggestion::submit(
            SuggestionCategory::Facility,
            "동아리방 조명",
            "전등 교체 부탁드립니다",
            Utc::now(),
        )
        .expect("valid suggestion")
    }

    #[test]
    fn submit_trims_and_starts_pending() {
        let suggestion =
            Suggestion::submit(SuggestionCategory::Other, "  제목 ", " 내용 ", Utc::now())
                .expect("valid suggestion");
        assert_eq!(suggestion.title, "제목");
        assert_eq!(suggestion.content, "내용");
        assert_eq!(suggestion.status, SuggestionStatus::Pending);
        assert!(suggestion.id.0.starts_with("sug_"));
    }

    #[test]
    fn submit_rejects_blank_fields() {
        let result = Suggestion::submit(SuggestionCategory::Other, " ", "내용", Utc::now());
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut suggestion = pending();
        suggestion
            .transition(SuggestionStatus::InReview, None, Utc::now())
            .expect("pending -> in_review");
        suggestion
            .transition(SuggestionStatus::Resolved, Some("교체 완료".to_owned()), Utc::now())
            .expect("in_review -> resolved");
        assert_eq!(suggestion.admin_note.as_deref(), Some("교체 완료"));

        let error = suggestion
            .transition(SuggestionStatus::Pending, None, Utc::now())
            .expect_err("terminal state");
        assert_eq!(
            error,
            DomainError::InvalidSuggestionTransition {
                from: SuggestionStatus::Resolved,
                to: SuggestionStatus::Pending,
            }
        );
    }

    #[test]
    fn status_and_category_parse_from_wire_names() {
        assert_eq!("in_review".parse::<SuggestionStatus>().ok(), Some(SuggestionStatus::InReview));
        assert_eq!("event".parse::<SuggestionCategory>().ok(), Some(SuggestionCategory::Event));
        assert!("unknown".parse::<SuggestionStatus>().is_err());
    }
}
