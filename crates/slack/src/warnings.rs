use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use clubbot_core::domain::activity::{ActivityLog, ActivityType};
use clubbot_core::domain::member::Member;
use clubbot_db::Repositories;

use crate::api::SlackApi;
use crate::blocks::name_warning_message;
use crate::handler::HandlerError;

/// DMs the member about their display name, then bumps the counter and logs it.
///
/// Nothing is recorded when the DM fails, so a later run retries the member.
pub async fn send_name_warning(
    slack: &dyn SlackApi,
    repos: &Repositories,
    member: &Member,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<Member, HandlerError> {
    slack.send_dm(&member.id.0, &name_warning_message(&member.display_name)).await?;

    let warned = repos.members.record_warning(&member.id, now).await?;
    repos
        .activity
        .append(&ActivityLog::record(
            ActivityType::NameWarningSent,
            actor_id,
            Some(warned.id.0.clone()),
            json!({
                "displayName": warned.display_name,
                "warningCount": warned.warning_count,
            }),
            now,
        ))
        .await?;

    info!(
        event_name = "member.name_warning.sent",
        member_id = %warned.id.0,
        actor_id,
        warning_count = warned.warning_count,
        "name warning sent"
    );
    Ok(warned)
}
