pub mod config;
pub mod domain;
pub mod errors;
pub mod ids;
pub mod name_check;

pub use domain::activity::{ActivityId, ActivityLog, ActivityType};
pub use domain::event::{ClubEvent, EventId, Rsvp};
pub use domain::member::{Member, MemberId, MemberRole};
pub use domain::payment::{
    Deposit, DepositId, DepositStatus, MatchId, PaymentMatch, Submission, SubmissionId,
    SubmissionStatus,
};
pub use domain::session::Session;
pub use domain::suggestion::{Suggestion, SuggestionCategory, SuggestionId, SuggestionStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use name_check::{NameCheckPolicy, NameCheckReport, NameCheckVerdict};
