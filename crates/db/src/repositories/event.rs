use chrono::{DateTime, Utc};

use clubbot_core::domain::event::{ClubEvent, EventId, Rsvp};
use clubbot_core::domain::member::MemberId;

use super::RepositoryError;
use crate::entities::{event_partition, rsvp_member_partition, EVENT_PARTITION};
use crate::keys::{sort_timestamp, IndexQuery, SortCondition};
use crate::table::SingleTable;

#[derive(Clone)]
pub struct EventRepository {
    table: SingleTable,
}

impl EventRepository {
    pub fn new(table: SingleTable) -> Self {
        Self { table }
    }

    pub async fn find_by_id(&self, id: &EventId) -> Result<Option<ClubEvent>, RepositoryError> {
        self.table.get(id).await
    }

    pub async fn save(&self, event: &ClubEvent) -> Result<(), RepositoryError> {
        self.table.put(event).await
    }

    pub async fn upcoming(&self, from: DateTime<Utc>) -> Result<Vec<ClubEvent>, RepositoryError> {
        self.table
            .query(
                IndexQuery::gsi1(EVENT_PARTITION)
                    .sort(SortCondition::GreaterOrEqual(sort_timestamp(from))),
            )
            .await
    }

    /// Later responses by the same member replace earlier ones.
    pub async fn save_rsvp(&self, rsvp: &Rsvp) -> Result<(), RepositoryError> {
        self.table.put(rsvp).await
    }

    pub async fn find_rsvp(
        &self,
        event_id: &EventId,
        member_id: &MemberId,
    ) -> Result<Option<Rsvp>, RepositoryError> {
        self.table.get::<Rsvp>(&(event_id.clone(), member_id.clone())).await
    }

    pub async fn rsvps_for_event(&self, event_id: &EventId) -> Result<Vec<Rsvp>, RepositoryError> {
        self.table
            .query(
                IndexQuery::primary(event_partition(event_id))
                    .sort(SortCondition::BeginsWith("RSVP#".to_string())),
            )
            .await
    }

    /// Most recent first.
    pub async fn rsvps_for_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<Rsvp>, RepositoryError> {
        self.table.query(IndexQuery::gsi1(rsvp_member_partition(member_id)).descending()).await
    }
}
