use chrono::{DateTime, Utc};

use clubbot_core::domain::member::{Member, MemberId};

use super::RepositoryError;
use crate::entities::{member_name_partition, MEMBER_PARTITION};
use crate::keys::IndexQuery;
use crate::table::{Entity, SingleTable};

#[derive(Clone)]
pub struct MemberRepository {
    table: SingleTable,
}

impl MemberRepository {
    pub fn new(table: SingleTable) -> Self {
        Self { table }
    }

    pub async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, RepositoryError> {
        self.table.get(id).await
    }

    pub async fn save(&self, member: &Member) -> Result<(), RepositoryError> {
        self.table.put(member).await
    }

    /// All members in join order.
    pub async fn list(&self) -> Result<Vec<Member>, RepositoryError> {
        self.table.query(IndexQuery::gsi1(MEMBER_PARTITION)).await
    }

    /// Members by name validity, ordered by display name.
    pub async fn list_by_name_validity(&self, valid: bool) -> Result<Vec<Member>, RepositoryError> {
        self.table.query(IndexQuery::gsi2(member_name_partition(valid))).await
    }

    /// Bumps the warning counter of an existing member.
    pub async fn record_warning(
        &self,
        id: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Member, RepositoryError> {
        let mut member = self.find_by_id(id).await?.ok_or_else(|| RepositoryError::NotFound {
            entity_type: Member::ENTITY_TYPE,
            key: Member::key_for(id).to_string(),
        })?;
        member.record_warning(now);
        self.save(&member).await?;
        Ok(member)
    }
}
