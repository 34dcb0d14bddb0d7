use chrono::{DateTime, Utc};
use tracing::debug;

use clubbot_core::domain::session::Session;

use super::RepositoryError;
use crate::entities::session_user_partition;
use crate::keys::IndexQuery;
use crate::table::{delete_request, SingleTable};

#[derive(Clone)]
pub struct SessionRepository {
    table: SingleTable,
}

impl SessionRepository {
    pub fn new(table: SingleTable) -> Self {
        Self { table }
    }

    pub async fn create(&self, session: &Session) -> Result<(), RepositoryError> {
        self.table.put(session).await
    }

    pub async fn find(&self, token: &str) -> Result<Option<Session>, RepositoryError> {
        self.table.get::<Session>(token).await
    }

    /// Returns the session only while it has not expired. An expired session
    /// is deleted on the way out.
    pub async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, RepositoryError> {
        match self.find(token).await? {
            Some(session) if session.is_expired(now) => {
                self.revoke(token).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Deletes every expired session of `username`; returns how many went.
    pub async fn purge_expired(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let sessions: Vec<Session> =
            self.table.query(IndexQuery::gsi1(session_user_partition(username))).await?;
        let requests: Vec<_> = sessions
            .iter()
            .filter(|session| session.is_expired(now))
            .map(|session| delete_request::<Session>(&session.token))
            .collect();
        if requests.is_empty() {
            return Ok(0);
        }

        let mut purged = 0;
        for item in self.table.batch_write(requests).await {
            match item.result {
                Ok(()) => purged += 1,
                Err(error) => debug!(key = %item.key, error = %error, "expired session kept"),
            }
        }
        Ok(purged)
    }

    pub async fn revoke(&self, token: &str) -> Result<bool, RepositoryError> {
        self.table.delete::<Session>(token).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use clubbot_core::domain::session::Session;

    use super::SessionRepository;
    use crate::table::SingleTable;

    #[tokio::test]
    async fn expired_sessions_are_hidden_and_deleted() {
        let repo = SessionRepository::new(SingleTable::in_memory());
        let now = Utc::now();
        let session = Session::issue("root", Duration::hours(1), now);
        repo.create(&session).await.expect("create");

        assert!(repo.find_active(&session.token, now).await.expect("find").is_some());
        assert!(repo
            .find_active(&session.token, now + Duration::hours(2))
            .await
            .expect("find expired")
            .is_none());

        assert!(repo.find(&session.token).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn revoke_reports_whether_a_session_existed() {
        let repo = SessionRepository::new(SingleTable::in_memory());
        let session = Session::issue("root", Duration::hours(1), Utc::now());
        repo.create(&session).await.expect("create");

        assert!(repo.revoke(&session.token).await.expect("revoke"));
        assert!(repo.find(&session.token).await.expect("find revoked").is_none());
        assert!(!repo.revoke(&session.token).await.expect("revoke twice"));
    }

    #[tokio::test]
    async fn purge_expired_only_removes_stale_sessions_of_that_user() {
        let repo = SessionRepository::new(SingleTable::in_memory());
        let now = Utc::now();
        let stale = Session::issue("root", Duration::hours(1), now - Duration::hours(3));
        let older = Session::issue("root", Duration::hours(1), now - Duration::hours(2));
        let live = Session::issue("root", Duration::hours(1), now);
        let other_user = Session::issue("staff", Duration::hours(1), now - Duration::hours(3));
        for session in [&stale, &older, &live, &other_user] {
            repo.create(session).await.expect("create");
        }

        assert_eq!(repo.purge_expired("root", now).await.expect("purge"), 2);
        assert!(repo.find(&stale.token).await.expect("find").is_none());
        assert!(repo.find(&older.token).await.expect("find").is_none());
        assert!(repo.find(&live.token).await.expect("find").is_some());
        assert!(repo.find(&other_user.token).await.expect("find").is_some());
        assert_eq!(repo.purge_expired("root", now).await.expect("purge again"), 0);
    }
}
