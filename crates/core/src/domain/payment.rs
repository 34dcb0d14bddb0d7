//! Reconciliation records for membership-fee payments.
//!
//! A form submission says "I paid"; a deposit notification says "money arrived".
//! The two are linked when the depositor name and amount agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Matched,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Unmatched,
    Matched,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::Matched => "matched",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub respondent_name: String,
    pub student_id: Option<String>,
    pub email: Option<String>,
    pub depositor_name: String,
    pub amount: i64,
    pub form_response_id: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub matched_deposit_id: Option<DepositId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: DepositId,
    pub depositor_name: String,
    pub amount: i64,
    pub bank: Option<String>,
    pub raw_message: Option<String>,
    pub status: DepositStatus,
    pub received_at: DateTime<Utc>,
    pub matched_submission_id: Option<SubmissionId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMatch {
    pub id: MatchId,
    pub submission_id: SubmissionId,
    pub deposit_id: DepositId,
    pub amount: i64,
    pub matched_at: DateTime<Utc>,
}

impl Submission {
    pub fn new_id() -> SubmissionId {
        SubmissionId(ids::generate_id("sub"))
    }

    pub fn matches(&self, deposit: &Deposit) -> bool {
        self.status == SubmissionStatus::Pending
            && deposit.status == DepositStatus::Unmatched
            && self.amount == deposit.amount
            && normalize_depositor_name(&self.depositor_name)
                == normalize_depositor_name(&deposit.depositor_name)
    }
}

impl Deposit {
    pub fn new_id() -> DepositId {
        DepositId(ids::generate_id("dep"))
    }
}

impl PaymentMatch {
    /// Marks both sides matched and returns the linking record.
    pub fn link(
        submission: &mut Submission,
        deposit: &mut Deposit,
        now: DateTime<Utc>,
    ) -> PaymentMatch {
        submission.status = SubmissionStatus::Matched;
        submission.matched_deposit_id = Some(deposit.id.clone());
        deposit.status = DepositStatus::Matched;
        deposit.matched_submission_id = Some(submission.id.clone());

        PaymentMatch {
            id: MatchId(ids::generate_id("mat")),
            submission_id: submission.id.clone(),
            deposit_id: deposit.id.clone(),
            amount: deposit.amount,
            matched_at: now,
        }
    }
}

pub fn normalize_depositor_name(name: &str) -> String {
    name.chars().filter(|ch| !ch.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// Oldest unmatched deposit agreeing with the submission.
pub fn find_deposit_for<'a>(
    submission: &Submission,
    deposits: &'a [Deposit],
) -> Option<&'a Deposit> {
    deposits
        .iter()
        .filter(|deposit| submission.matches(deposit))
        .min_by_key(|deposit| deposit.received_at)
}

/// Oldest pending submission agreeing with the deposit.
pub fn find_submission_for<'a>(
    deposit: &Deposit,
    submissions: &'a [Submission],
) -> Option<&'a Submission> {
    submissions
        .iter()
        .filter(|submission| submission.matches(deposit))
        .min_by_key(|submission| submission.submitted_at)
}
