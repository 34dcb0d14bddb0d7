use chrono::{DateTime, Utc};
use tracing::warn;

use clubbot_core::domain::payment::{
    Deposit, DepositId, DepositStatus, PaymentMatch, Submission, SubmissionId, SubmissionStatus,
};

use super::RepositoryError;
use crate::entities::{
    deposit_status_partition, match_deposit_partition, match_submission_partition,
    submission_status_partition,
};
use crate::keys::IndexQuery;
use crate::table::{put_request, SingleTable};

/// Both sides of a reconciliation after they were linked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchOutcome {
    pub payment_match: PaymentMatch,
    pub submission: Submission,
    pub deposit: Deposit,
}

#[derive(Clone)]
pub struct PaymentRepository {
    table: SingleTable,
}

impl PaymentRepository {
    pub fn new(table: SingleTable) -> Self {
        Self { table }
    }

    pub async fn save_submission(&self, submission: &Submission) -> Result<(), RepositoryError> {
        self.table.put(submission).await
    }

    pub async fn save_deposit(&self, deposit: &Deposit) -> Result<(), RepositoryError> {
        self.table.put(deposit).await
    }

    pub async fn find_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<Submission>, RepositoryError> {
        self.table.get(id).await
    }

    pub async fn find_deposit(&self, id: &DepositId) -> Result<Option<Deposit>, RepositoryError> {
        self.table.get(id).await
    }

    /// Oldest first.
    pub async fn pending_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        let partition = submission_status_partition(SubmissionStatus::Pending.as_str());
        self.table.query(IndexQuery::gsi1(partition)).await
    }

    /// Oldest first.
    pub async fn unmatched_deposits(&self) -> Result<Vec<Deposit>, RepositoryError> {
        self.table
            .query(IndexQuery::gsi1(deposit_status_partition(DepositStatus::Unmatched.as_str())))
            .await
    }

    /// Links the pair and persists the submission, the deposit and the match record
    /// in one transaction, so a failure leaves both sides unmatched.
    pub async fn record_match(
        &self,
        mut submission: Submission,
        mut deposit: Deposit,
        now: DateTime<Utc>,
    ) -> Result<MatchOutcome, RepositoryError> {
        let payment_match = PaymentMatch::link(&mut submission, &mut deposit, now);

        let requests = vec![
            put_request(&submission)?,
            put_request(&deposit)?,
            put_request(&payment_match)?,
        ];
        self.table.transact_write(requests).await.map_err(|error| {
            warn!(
                submission_id = %submission.id.0,
                deposit_id = %deposit.id.0,
                error = %error,
                "payment match write failed"
            );
            error
        })?;

        Ok(MatchOutcome { payment_match, submission, deposit })
    }

    pub async fn matches_for_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Vec<PaymentMatch>, RepositoryError> {
        self.table.query(IndexQuery::gsi1(match_submission_partition(id))).await
    }

    pub async fn matches_for_deposit(
        &self,
        id: &DepositId,
    ) -> Result<Vec<PaymentMatch>, RepositoryError> {
        self.table.query(IndexQuery::gsi2(match_deposit_partition(id))).await
    }
}
