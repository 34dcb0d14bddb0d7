//! Key layout of every club entity.

use chrono::{DateTime, Utc};

use clubbot_core::domain::activity::{ActivityId, ActivityLog};
use clubbot_core::domain::event::{ClubEvent, EventId, Rsvp};
use clubbot_core::domain::member::{Member, MemberId};
use clubbot_core::domain::payment::{
    Deposit, DepositId, MatchId, PaymentMatch, Submission, SubmissionId,
};
use clubbot_core::domain::session::Session;
use clubbot_core::domain::suggestion::{Suggestion, SuggestionId};
use clubbot_core::ids::daily_bucket;

use crate::keys::{sort_timestamp, IndexKey, ItemKey};
use crate::repositories::RepositoryError;
use crate::table::Entity;

pub const MEMBER_PARTITION: &str = "MEMBER";
pub const EVENT_PARTITION: &str = "EVENT";
pub const SUGGESTION_PARTITION: &str = "SUGGESTION";

pub fn member_name_partition(valid: bool) -> String {
    format!("MEMBER#NAME#{}", if valid { "valid" } else { "invalid" })
}

pub fn event_partition(event_id: &EventId) -> String {
    format!("EVENT#{}", event_id.0)
}

pub fn rsvp_member_partition(member_id: &MemberId) -> String {
    format!("RSVP#MEMBER#{}", member_id.0)
}

pub fn activity_target_partition(target_id: &str) -> String {
    format!("LOG#TARGET#{target_id}")
}

pub fn session_user_partition(username: &str) -> String {
    format!("SESSION#USER#{username}")
}

pub fn suggestion_category_partition(category: &str) -> String {
    format!("SUGGESTION#CATEGORY#{category}")
}

pub fn submission_status_partition(status: &str) -> String {
    format!("SUBMISSION#STATUS#{status}")
}

pub fn deposit_status_partition(status: &str) -> String {
    format!("DEPOSIT#STATUS#{status}")
}

pub fn match_submission_partition(submission_id: &SubmissionId) -> String {
    format!("MATCH#SUBMISSION#{}", submission_id.0)
}

pub fn match_deposit_partition(deposit_id: &DepositId) -> String {
    format!("MATCH#DEPOSIT#{}", deposit_id.0)
}

impl Entity for Member {
    const ENTITY_TYPE: &'static str = "Member";
    type Id = MemberId;

    fn key_for(id: &MemberId) -> ItemKey {
        ItemKey::new(format!("MEMBER#{}", id.0), "PROFILE")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            MEMBER_PARTITION,
            format!("{}#{}", sort_timestamp(self.joined_at), self.id.0),
        ))
    }

    fn gsi2(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            member_name_partition(self.name_format_valid),
            self.display_name.clone(),
        ))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn normalize(&mut self, previous: &Self) -> Result<(), RepositoryError> {
        if self.warning_count < previous.warning_count {
            return Err(RepositoryError::Rejected(format!(
                "warningCount of member {} may not drop from {} to {}",
                self.id.0, previous.warning_count, self.warning_count
            )));
        }
        self.derive_name_fields();
        Ok(())
    }
}

impl Entity for ClubEvent {
    const ENTITY_TYPE: &'static str = "ClubEvent";
    type Id = EventId;

    fn key_for(id: &EventId) -> ItemKey {
        ItemKey::new(event_partition(id), "DETAIL")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(EVENT_PARTITION, sort_timestamp(self.starts_at)))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Rsvp {
    const ENTITY_TYPE: &'static str = "Rsvp";
    type Id = (EventId, MemberId);

    fn key_for((event_id, member_id): &(EventId, MemberId)) -> ItemKey {
        ItemKey::new(event_partition(event_id), format!("RSVP#{}", member_id.0))
    }

    fn key(&self) -> ItemKey {
        ItemKey::new(event_partition(&self.event_id), format!("RSVP#{}", self.member_id.0))
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            rsvp_member_partition(&self.member_id),
            sort_timestamp(self.responded_at),
        ))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.responded_at
    }
}

impl Entity for ActivityLog {
    const ENTITY_TYPE: &'static str = "ActivityLog";
    type Id = ActivityId;

    fn key_for(id: &ActivityId) -> ItemKey {
        ItemKey::new(format!("LOG#{}", id.0), "ENTRY")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            daily_bucket("LOG", self.created_at),
            format!("{}#{}", sort_timestamp(self.created_at), self.id.0),
        ))
    }

    fn gsi2(&self) -> Option<IndexKey> {
        self.target_id.as_deref().map(|target| {
            IndexKey::new(activity_target_partition(target), sort_timestamp(self.created_at))
        })
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Session {
    const ENTITY_TYPE: &'static str = "Session";
    type Id = str;

    fn key_for(token: &str) -> ItemKey {
        ItemKey::new(format!("SESSION#{token}"), "SESSION")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.token)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(session_user_partition(&self.username), sort_timestamp(self.created_at)))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Suggestion {
    const ENTITY_TYPE: &'static str = "Suggestion";
    type Id = SuggestionId;

    fn key_for(id: &SuggestionId) -> ItemKey {
        ItemKey::new(format!("SUGGESTION#{}", id.0), "DETAIL")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            SUGGESTION_PARTITION,
            format!("{}#{}", self.status.as_str(), sort_timestamp(self.created_at)),
        ))
    }

    fn gsi2(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            suggestion_category_partition(self.category.as_str()),
            sort_timestamp(self.created_at),
        ))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for Submission {
    const ENTITY_TYPE: &'static str = "Submission";
    type Id = SubmissionId;

    fn key_for(id: &SubmissionId) -> ItemKey {
        ItemKey::new(format!("SUBMISSION#{}", id.0), "DETAIL")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            submission_status_partition(self.status.as_str()),
            sort_timestamp(self.submitted_at),
        ))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

impl Entity for Deposit {
    const ENTITY_TYPE: &'static str = "Deposit";
    type Id = DepositId;

    fn key_for(id: &DepositId) -> ItemKey {
        ItemKey::new(format!("DEPOSIT#{}", id.0), "DETAIL")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            deposit_status_partition(self.status.as_str()),
            sort_timestamp(self.received_at),
        ))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl Entity for PaymentMatch {
    const ENTITY_TYPE: &'static str = "PaymentMatch";
    type Id = MatchId;

    fn key_for(id: &MatchId) -> ItemKey {
        ItemKey::new(format!("MATCH#{}", id.0), "DETAIL")
    }

    fn key(&self) -> ItemKey {
        Self::key_for(&self.id)
    }

    fn gsi1(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            match_submission_partition(&self.submission_id),
            sort_timestamp(self.matched_at),
        ))
    }

    fn gsi2(&self) -> Option<IndexKey> {
        Some(IndexKey::new(
            match_deposit_partition(&self.deposit_id),
            sort_timestamp(self.matched_at),
        ))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.matched_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    use clubbot_core::domain::member::{Member, MemberId};
    use clubbot_core::domain::suggestion::{Suggestion, SuggestionCategory};

    use crate::keys::{IndexKey, IndexQuery};
    use crate::repositories::RepositoryError;
    use crate::store::WriteRequest;
    use crate::table::{put_request, to_item, Entity, SingleTable};

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn member_keys_follow_layout() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time");
        let member = Member::joined(MemberId("U1".into()), "홍길동/23", "Hong", at);

        assert_eq!(member.key().pk, "MEMBER#U1");
        assert_eq!(member.key().sk, "PROFILE");
        assert_eq!(
            member.gsi1(),
            Some(IndexKey::new("MEMBER", "2026-03-01T09:00:00.000000Z#U1"))
        );
        assert_eq!(member.gsi2(), Some(IndexKey::new("MEMBER#NAME#valid", "홍길동/23")));
    }

    #[tokio::test]
    async fn update_merges_attributes_and_moves_index_partition() {
        let table = SingleTable::in_memory();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time");
        let member = Member::joined(MemberId("U1".into()), "gildong", "Hong", at);
        table.put(&member).await.expect("put");

        let updated: Member = table
            .update(
                &member.id,
                patch(json!({ "displayName": "홍길동/23", "nameFormatValid": true })),
            )
            .await
            .expect("update");
        assert_eq!(updated.display_name, "홍길동/23");
        assert_eq!(updated.real_name, "Hong");

        let valid: Vec<Member> =
            table.query(IndexQuery::gsi2("MEMBER#NAME#valid")).await.expect("query valid");
        let invalid: Vec<Member> =
            table.query(IndexQuery::gsi2("MEMBER#NAME#invalid")).await.expect("query invalid");
        assert_eq!(valid.len(), 1);
        assert!(invalid.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_member_derived_fields_and_warning_history() {
        let table = SingleTable::in_memory();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time");
        let mut member = Member::joined(MemberId("U1".into()), "홍길동/23", "Hong", at);
        member.record_warning(at);
        member.record_warning(at);
        table.put(&member).await.expect("put");

        let error = table
            .update::<Member>(&member.id, patch(json!({ "warningCount": 0 })))
            .await
            .expect_err("warning count lowered");
        assert!(matches!(error, RepositoryError::Rejected(_)));
        assert!(!error.is_retryable());
        let stored: Option<Member> = table.get(&member.id).await.expect("get");
        assert_eq!(stored.map(|member| member.warning_count), Some(2));

        let renamed: Member = table
            .update(&member.id, patch(json!({ "displayName": "nickname" })))
            .await
            .expect("rename");
        assert!(!renamed.name_format_valid);
        assert_eq!(renamed.canonical_name, None);
        assert_eq!(renamed.warning_count, 2);

        let valid: Vec<Member> =
            table.query(IndexQuery::gsi2("MEMBER#NAME#valid")).await.expect("query valid");
        let invalid: Vec<Member> =
            table.query(IndexQuery::gsi2("MEMBER#NAME#invalid")).await.expect("query invalid");
        assert!(valid.is_empty());
        let names: Vec<&str> = invalid.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, ["nickname"]);

        let raised: Member = table
            .update(&member.id, patch(json!({ "warningCount": 3, "nameFormatValid": true })))
            .await
            .expect("raise");
        assert_eq!(raised.warning_count, 3);
        assert!(!raised.name_format_valid);
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let table = SingleTable::in_memory();
        let error = table
            .update::<Member>(&MemberId("ghost".into()), patch(json!({ "realName": "x" })))
            .await
            .expect_err("missing member");

        assert!(matches!(error, RepositoryError::NotFound { entity_type: "Member", .. }));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn update_that_breaks_the_entity_is_a_decode_error() {
        let table = SingleTable::in_memory();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time");
        let member = Member::joined(MemberId("U1".into()), "홍길동/23", "Hong", at);
        table.put(&member).await.expect("put");

        let error = table
            .update::<Member>(&member.id, patch(json!({ "warningCount": "many" })))
            .await
            .expect_err("invalid merge");
        assert!(matches!(error, RepositoryError::Decode(_)));

        let stored: Option<Member> = table.get(&member.id).await.expect("get");
        assert_eq!(stored, Some(member));
    }

    #[tokio::test]
    async fn batch_results_align_with_requests() {
        let table = SingleTable::in_memory();
        let now = Utc::now();
        let first = Suggestion::submit(SuggestionCategory::Event, "MT", "봄 MT 가요", now)
            .expect("suggestion");
        let second = Suggestion::submit(SuggestionCategory::Other, "간식", "간식 추가", now)
            .expect("suggestion");

        let mut broken = to_item(&Member::joined(MemberId("U9".into()), "x", "y", now))
            .expect("item");
        broken.key.pk = String::new();

        let results = table
            .batch_write(vec![
                put_request(&first).expect("request"),
                WriteRequest::Put(broken),
                put_request(&second).expect("request"),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].key, first.key());
        assert!(results[0].is_ok());
        assert!(matches!(results[1].result, Err(RepositoryError::InvalidKey(_))));
        assert!(results[2].is_ok());
    }
}
