use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use clubbot_core::domain::activity::{ActivityLog, ActivityType};
use clubbot_core::domain::member::{Member, MemberId};

use crate::blocks::{mention_placeholder_message, welcome_message};
use crate::envelope::{AppMentionEvent, LifecycleEvent, SlackUser};
use crate::handler::{HandlerContext, HandlerError, HandlerResult};

#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn handle(
        &self,
        event: &LifecycleEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError>;
}

/// Workspace events keyed by their exact Events API type.
#[derive(Default)]
pub struct LifecycleRegistry {
    handlers: HashMap<String, Arc<dyn LifecycleHandler>>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, event_type: impl Into<String>, handler: H)
    where
        H: LifecycleHandler + 'static,
    {
        self.handlers.insert(event_type.into(), Arc::new(handler));
    }

    pub fn resolve(&self, event_type: &str) -> Option<Arc<dyn LifecycleHandler>> {
        self.handlers.get(event_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn default_lifecycle_registry() -> LifecycleRegistry {
    let mut registry = LifecycleRegistry::new();
    registry.register("team_join", MemberJoinedHandler);
    registry.register("user_change", ProfileChangedHandler);
    registry.register("app_mention", MentionHandler);
    registry
}

fn is_person(user: &SlackUser) -> bool {
    !user.is_bot && !user.deleted && user.id != "USLACKBOT"
}

/// Registers the member, greets them by DM and logs the join.
pub struct MemberJoinedHandler;

#[async_trait]
impl LifecycleHandler for MemberJoinedHandler {
    async fn handle(
        &self,
        event: &LifecycleEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        let LifecycleEvent::TeamJoin { user } = event else {
            return Ok(HandlerResult::Ignored);
        };
        if !is_person(user) {
            return Ok(HandlerResult::Ignored);
        }

        let id = MemberId(user.id.clone());
        let member = match ctx.repos.members.find_by_id(&id).await? {
            Some(existing) => existing,
            None => {
                let member = Member::joined(id, user.display_name(), user.real_name(), ctx.now);
                ctx.repos.members.save(&member).await?;
                member
            }
        };

        ctx.slack
            .send_dm(&member.id.0, &welcome_message(&member.display_name, member.name_format_valid))
            .await?;

        ctx.repos
            .activity
            .append(&ActivityLog::record(
                ActivityType::MemberJoined,
                member.id.0.clone(),
                Some(member.id.0.clone()),
                json!({
                    "displayName": member.display_name,
                    "nameFormatValid": member.name_format_valid,
                }),
                ctx.now,
            ))
            .await?;

        info!(
            event_name = "slack.member.joined",
            correlation_id = %ctx.correlation_id,
            member_id = %member.id.0,
            name_format_valid = member.name_format_valid,
            "member joined"
        );
        Ok(HandlerResult::Processed)
    }
}

/// Keeps stored names in step with Slack profiles.
pub struct ProfileChangedHandler;

#[async_trait]
impl LifecycleHandler for ProfileChangedHandler {
    async fn handle(
        &self,
        event: &LifecycleEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        let LifecycleEvent::UserChange { user } = event else {
            return Ok(HandlerResult::Ignored);
        };
        if !is_person(user) {
            return Ok(HandlerResult::Ignored);
        }

        let display_name = user.display_name();
        let real_name = user.real_name();
        let id = MemberId(user.id.clone());

        let (member, previous_name) = match ctx.repos.members.find_by_id(&id).await? {
            Some(mut member) => {
                if member.display_name == display_name && member.real_name == real_name {
                    return Ok(HandlerResult::Ignored);
                }
                let previous = std::mem::take(&mut member.display_name);
                member.rename(display_name, real_name, ctx.now);
                (member, Some(previous))
            }
            None => (Member::joined(id, display_name, real_name, ctx.now), None),
        };
        ctx.repos.members.save(&member).await?;

        ctx.repos
            .activity
            .append(&ActivityLog::record(
                ActivityType::ProfileUpdated,
                member.id.0.clone(),
                Some(member.id.0.clone()),
                json!({
                    "previousDisplayName": previous_name,
                    "displayName": member.display_name,
                    "nameFormatValid": member.name_format_valid,
                }),
                ctx.now,
            ))
            .await?;

        info!(
            event_name = "slack.member.profile_updated",
            correlation_id = %ctx.correlation_id,
            member_id = %member.id.0,
            name_format_valid = member.name_format_valid,
            "member profile updated"
        );
        Ok(HandlerResult::Processed)
    }
}

/// Replies in thread. Question answering is not wired up yet.
pub struct MentionHandler;

#[async_trait]
impl LifecycleHandler for MentionHandler {
    async fn handle(
        &self,
        event: &LifecycleEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        let LifecycleEvent::AppMention(AppMentionEvent { channel, ts, thread_ts, user, .. }) = event
        else {
            return Ok(HandlerResult::Ignored);
        };

        let thread = thread_ts.as_deref().unwrap_or(ts);
        if let Err(error) =
            ctx.slack.post_message(channel, &mention_placeholder_message(), Some(thread)).await
        {
            warn!(
                event_name = "slack.mention.reply_failed",
                correlation_id = %ctx.correlation_id,
                user_id = %user,
                error = %error,
                "mention reply failed"
            );
            return Err(error.into());
        }
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use clubbot_core::domain::activity::ActivityType;
    use clubbot_core::domain::member::MemberId;
    use clubbot_db::Repositories;

    use super::default_lifecycle_registry;
    use crate::api::{fake_dm_channel, InMemorySlackApi, RecordedCall};
    use crate::envelope::{AppMentionEvent, LifecycleEvent, SlackProfile, SlackUser};
    use crate::handler::{HandlerContext, HandlerResult};

    fn user(id: &str, display_name: &str) -> SlackUser {
        SlackUser {
            id: id.into(),
            name: "handle".into(),
            profile: SlackProfile { display_name: display_name.into(), real_name: "실명".into() },
            ..SlackUser::default()
        }
    }

    fn context(repos: Repositories, slack: Arc<InMemorySlackApi>) -> HandlerContext {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).single().expect("time");
        HandlerContext::new(repos, slack).at(now)
    }

    async fn run(event: LifecycleEvent, ctx: &HandlerContext) -> HandlerResult {
        let handler =
            default_lifecycle_registry().resolve(event.event_type()).expect("registered handler");
        handler.handle(&event, ctx).await.expect("handle")
    }

    #[tokio::test]
    async fn team_join_stores_member_welcomes_and_logs() {
        let repos = Repositories::in_memory();
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(repos.clone(), slack.clone());

        let result = run(LifecycleEvent::TeamJoin { user: user("U1", "홍길동/23") }, &ctx).await;

        assert_eq!(result, HandlerResult::Processed);
        let member = repos.members.find_by_id(&MemberId("U1".into())).await.expect("find");
        let member = member.expect("stored");
        assert!(member.name_format_valid);

        let posted = slack.posted_messages().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, fake_dm_channel("U1"));

        let logs = repos.activity.for_day(ctx.now.date_naive()).await.expect("logs");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].activity_type, ActivityType::MemberJoined);
    }

    #[tokio::test]
    async fn bots_are_not_registered() {
        let repos = Repositories::in_memory();
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(repos.clone(), slack.clone());
        let mut bot = user("B1", "helper");
        bot.is_bot = true;

        let result = run(LifecycleEvent::TeamJoin { user: bot }, &ctx).await;

        assert_eq!(result, HandlerResult::Ignored);
        assert!(repos.members.list().await.expect("list").is_empty());
        assert!(slack.calls().await.is_empty());
    }

    #[tokio::test]
    async fn profile_change_recomputes_validity_and_logs_only_real_changes() {
        let repos = Repositories::in_memory();
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(repos.clone(), slack.clone());
        run(LifecycleEvent::TeamJoin { user: user("U1", "gildong") }, &ctx).await;

        let later = ctx.clone().at(ctx.now + Duration::hours(1));
        let result =
            run(LifecycleEvent::UserChange { user: user("U1", "홍길동/23") }, &later).await;
        assert_eq!(result, HandlerResult::Processed);

        let member = repos.members.find_by_id(&MemberId("U1".into())).await.expect("find");
        let member = member.expect("stored");
        assert_eq!(member.display_name, "홍길동/23");
        assert!(member.name_format_valid);

        let unchanged =
            run(LifecycleEvent::UserChange { user: user("U1", "홍길동/23") }, &later).await;
        assert_eq!(unchanged, HandlerResult::Ignored);

        let logs = repos.activity.for_day(ctx.now.date_naive()).await.expect("logs");
        let types: Vec<_> = logs.iter().map(|log| log.activity_type).collect();
        assert_eq!(types, vec![ActivityType::MemberJoined, ActivityType::ProfileUpdated]);
        assert_eq!(logs[1].details["previousDisplayName"], "gildong");
    }

    #[tokio::test]
    async fn mention_replies_in_thread() {
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(Repositories::in_memory(), slack.clone());
        let event = LifecycleEvent::AppMention(AppMentionEvent {
            user: "U1".into(),
            text: "<@B1> 회비 얼마야?".into(),
            channel: "C1".into(),
            ts: "1700000000.000100".into(),
            thread_ts: None,
        });

        let result = run(event, &ctx).await;

        assert_eq!(result, HandlerResult::Processed);
        let calls = slack.calls().await;
        assert!(matches!(
            &calls[..],
            [RecordedCall::PostMessage { channel, thread_ts: Some(thread), .. }]
                if channel == "C1" && thread == "1700000000.000100"
        ));
    }
}
