use chrono::NaiveDate;

use clubbot_core::domain::activity::ActivityLog;

use super::RepositoryError;
use crate::entities::activity_target_partition;
use crate::keys::{day_key, IndexQuery};
use crate::table::SingleTable;

/// Append-only activity trail.
#[derive(Clone)]
pub struct ActivityRepository {
    table: SingleTable,
}

impl ActivityRepository {
    pub fn new(table: SingleTable) -> Self {
        Self { table }
    }

    pub async fn append(&self, log: &ActivityLog) -> Result<(), RepositoryError> {
        self.table.put(log).await
    }

    /// Entries of one UTC day, oldest first.
    pub async fn for_day(&self, day: NaiveDate) -> Result<Vec<ActivityLog>, RepositoryError> {
        self.table.query(IndexQuery::gsi1(format!("LOG#{}", day_key(day)))).await
    }

    /// Entries about one target, newest first.
    pub async fn for_target(
        &self,
        target_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, RepositoryError> {
        self.table
            .query(IndexQuery::gsi2(activity_target_partition(target_id)).descending().limit(limit))
            .await
    }
}
