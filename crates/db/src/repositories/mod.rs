use thiserror::Error;

use crate::table::SingleTable;

pub mod activity;
pub mod event;
pub mod member;
pub mod payment;
pub mod session;
pub mod suggestion;

pub use activity::ActivityRepository;
pub use event::EventRepository;
pub use member::MemberRepository;
pub use payment::{MatchOutcome, PaymentRepository};
pub use session::SessionRepository;
pub use suggestion::SuggestionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity_type} not found at {key}")]
    NotFound { entity_type: &'static str, key: String },
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("update rejected: {0}")]
    Rejected(String),
}

impl RepositoryError {
    /// Whether repeating the same call later may succeed. Nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(error) => match error {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db) => {
                    // SQLITE_BUSY / SQLITE_LOCKED
                    matches!(db.code().as_deref(), Some("5") | Some("6"))
                }
                _ => false,
            },
            Self::Unavailable(_) => true,
            Self::Decode(_) | Self::NotFound { .. } | Self::InvalidKey(_) | Self::Rejected(_) => {
                false
            }
        }
    }
}

/// Every repository over one shared table handle.
#[derive(Clone)]
pub struct Repositories {
    pub members: MemberRepository,
    pub events: EventRepository,
    pub activity: ActivityRepository,
    pub sessions: SessionRepository,
    pub suggestions: SuggestionRepository,
    pub payments: PaymentRepository,
}

impl Repositories {
    pub fn new(table: SingleTable) -> Self {
        Self {
            members: MemberRepository::new(table.clone()),
            events: EventRepository::new(table.clone()),
            activity: ActivityRepository::new(table.clone()),
            sessions: SessionRepository::new(table.clone()),
            suggestions: SuggestionRepository::new(table.clone()),
            payments: PaymentRepository::new(table),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(SingleTable::in_memory())
    }
}
