//! Interactive components: buttons and modal submissions.
//!
//! Action ids resolve against exact registrations first, then against pattern
//! registrations in the order they were added. Modal submissions resolve by
//! callback id in their own table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use clubbot_core::domain::activity::{ActivityLog, ActivityType};
use clubbot_core::domain::event::{EventId, Rsvp};
use clubbot_core::domain::member::MemberId;
use clubbot_core::domain::suggestion::{Suggestion, SuggestionCategory};

use crate::blocks::{
    error_message, rsvp_recorded_message, suggestion_modal, suggestion_received_message,
    EVENT_RESPONSE_ACTION_PREFIX, GUIDE_OPEN_SUGGESTION_ACTION, SUGGESTION_CATEGORY_BLOCK,
    SUGGESTION_CATEGORY_INPUT, SUGGESTION_CONTENT_BLOCK, SUGGESTION_CONTENT_INPUT,
    SUGGESTION_MODAL_CALLBACK, SUGGESTION_TITLE_BLOCK, SUGGESTION_TITLE_INPUT,
};
use crate::envelope::{BlockActionEvent, ViewSubmissionEvent};
use crate::handler::{HandlerContext, HandlerError, HandlerResult};

/// Activity actor recorded for anonymous submissions.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(
        &self,
        action: &BlockActionEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError>;
}

#[async_trait]
pub trait ViewHandler: Send + Sync {
    async fn handle(
        &self,
        view: &ViewSubmissionEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError>;
}

type ActionPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Default)]
pub struct ActionRegistry {
    exact: HashMap<String, Arc<dyn ActionHandler>>,
    patterns: Vec<(ActionPredicate, Arc<dyn ActionHandler>)>,
    views: HashMap<String, Arc<dyn ViewHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, action_id: impl Into<String>, handler: H)
    where
        H: ActionHandler + 'static,
    {
        self.exact.insert(action_id.into(), Arc::new(handler));
    }

    pub fn register_pattern<P, H>(&mut self, predicate: P, handler: H)
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        H: ActionHandler + 'static,
    {
        self.patterns.push((Box::new(predicate), Arc::new(handler)));
    }

    pub fn register_prefix<H>(&mut self, prefix: impl Into<String>, handler: H)
    where
        H: ActionHandler + 'static,
    {
        let prefix = prefix.into();
        self.register_pattern(move |action_id| action_id.starts_with(&prefix), handler);
    }

    pub fn register_view<H>(&mut self, callback_id: impl Into<String>, handler: H)
    where
        H: ViewHandler + 'static,
    {
        self.views.insert(callback_id.into(), Arc::new(handler));
    }

    pub fn resolve(&self, action_id: &str) -> Option<Arc<dyn ActionHandler>> {
        if let Some(handler) = self.exact.get(action_id) {
            return Some(handler.clone());
        }
        self.patterns
            .iter()
            .find(|(matches, _)| matches(action_id))
            .map(|(_, handler)| handler.clone())
    }

    pub fn resolve_view(&self, callback_id: &str) -> Option<Arc<dyn ViewHandler>> {
        self.views.get(callback_id).cloned()
    }
}

pub fn default_action_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(GUIDE_OPEN_SUGGESTION_ACTION, OpenSuggestionModal);
    registry.register_prefix(EVENT_RESPONSE_ACTION_PREFIX, EventResponseHandler);
    registry.register_view(SUGGESTION_MODAL_CALLBACK, SuggestionSubmissionHandler);
    registry
}

pub struct OpenSuggestionModal;

#[async_trait]
impl ActionHandler for OpenSuggestionModal {
    async fn handle(
        &self,
        action: &BlockActionEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        if action.trigger_id.is_empty() {
            return Err(HandlerError::InvalidPayload("button press without trigger_id".into()));
        }
        ctx.slack.open_view(&action.trigger_id, &suggestion_modal()).await?;
        Ok(HandlerResult::Processed)
    }
}

/// RSVP buttons: the action id suffix is the chosen option, the value is the event id.
pub struct EventResponseHandler;

#[async_trait]
impl ActionHandler for EventResponseHandler {
    async fn handle(
        &self,
        action: &BlockActionEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        let response = action
            .action_id
            .strip_prefix(EVENT_RESPONSE_ACTION_PREFIX)
            .filter(|option| !option.is_empty())
            .ok_or_else(|| {
                HandlerError::InvalidPayload(format!(
                    "no response option in `{}`",
                    action.action_id
                ))
            })?;
        let event_id = action
            .value
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|value| EventId(value.to_string()))
            .ok_or_else(|| HandlerError::InvalidPayload("rsvp button without event id".into()))?;

        let event = match ctx.repos.events.find_by_id(&event_id).await? {
            Some(event) if event.accepts_response(response) => event,
            found => {
                warn!(
                    event_name = "slack.rsvp.rejected",
                    correlation_id = %ctx.correlation_id,
                    event_id = %event_id.0,
                    event_exists = found.is_some(),
                    response,
                    "rsvp rejected"
                );
                let summary = if found.is_some() {
                    "선택할 수 없는 응답입니다."
                } else {
                    "존재하지 않는 행사입니다."
                };
                let message = error_message(summary, &ctx.correlation_id);
                ctx.slack.send_dm(&action.user_id, &message).await?;
                return Ok(HandlerResult::Processed);
            }
        };

        let rsvp = Rsvp {
            event_id: event.id.clone(),
            member_id: MemberId(action.user_id.clone()),
            response: response.to_string(),
            responded_at: ctx.now,
        };
        ctx.repos.events.save_rsvp(&rsvp).await?;
        ctx.repos
            .activity
            .append(&ActivityLog::record(
                ActivityType::RsvpRecorded,
                action.user_id.clone(),
                Some(event.id.0.clone()),
                json!({ "response": response }),
                ctx.now,
            ))
            .await?;

        ctx.slack.send_dm(&action.user_id, &rsvp_recorded_message(&event.title, response)).await?;
        info!(
            event_name = "slack.rsvp.recorded",
            correlation_id = %ctx.correlation_id,
            event_id = %event.id.0,
            response,
            "rsvp recorded"
        );
        Ok(HandlerResult::Processed)
    }
}

/// Stores a suggestion from the modal without linking it to the submitter.
pub struct SuggestionSubmissionHandler;

impl SuggestionSubmissionHandler {
    fn validate(
        view: &ViewSubmissionEvent,
    ) -> Result<(SuggestionCategory, String, String), BTreeMap<String, String>> {
        let mut errors = BTreeMap::new();

        let category = view
            .value(SUGGESTION_CATEGORY_BLOCK, SUGGESTION_CATEGORY_INPUT)
            .and_then(|raw| raw.parse::<SuggestionCategory>().ok());
        if category.is_none() {
            errors.insert(
                SUGGESTION_CATEGORY_BLOCK.to_string(),
                "분류를 선택해 주세요.".to_string(),
            );
        }
        let title = view.value(SUGGESTION_TITLE_BLOCK, SUGGESTION_TITLE_INPUT);
        if title.is_none() {
            errors.insert(SUGGESTION_TITLE_BLOCK.to_string(), "제목을 입력해 주세요.".to_string());
        }
        let content = view.value(SUGGESTION_CONTENT_BLOCK, SUGGESTION_CONTENT_INPUT);
        if content.is_none() {
            errors.insert(
                SUGGESTION_CONTENT_BLOCK.to_string(),
                "내용을 입력해 주세요.".to_string(),
            );
        }

        match (category, title, content) {
            (Some(category), Some(title), Some(content)) if errors.is_empty() => {
                Ok((category, title.to_string(), content.to_string()))
            }
            _ => Err(errors),
        }
    }
}

#[async_trait]
impl ViewHandler for SuggestionSubmissionHandler {
    async fn handle(
        &self,
        view: &ViewSubmissionEvent,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        let (category, title, content) = match Self::validate(view) {
            Ok(fields) => fields,
            Err(errors) => return Ok(HandlerResult::ViewErrors(errors)),
        };

        let suggestion = Suggestion::submit(category, title, content, ctx.now)?;
        ctx.repos.suggestions.save(&suggestion).await?;
        ctx.repos
            .activity
            .append(&ActivityLog::record(
                ActivityType::SuggestionSubmitted,
                ANONYMOUS_ACTOR,
                Some(suggestion.id.0.clone()),
                json!({ "category": suggestion.category.as_str() }),
                ctx.now,
            ))
            .await?;

        info!(
            event_name = "slack.suggestion.submitted",
            correlation_id = %ctx.correlation_id,
            suggestion_id = %suggestion.id.0,
            category = suggestion.category.as_str(),
            "suggestion submitted"
        );

        // The suggestion is already stored; a failed receipt must not surface as a modal error.
        if let Err(error) = ctx.slack.send_dm(&view.user_id, &suggestion_received_message()).await {
            warn!(
                event_name = "slack.suggestion.receipt_failed",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "suggestion receipt DM failed"
            );
        }
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use clubbot_core::domain::activity::ActivityType;
    use clubbot_core::domain::event::{ClubEvent, EventId};
    use clubbot_core::domain::member::MemberId;
    use clubbot_db::Repositories;

    use super::{default_action_registry, ActionHandler, ActionRegistry, ANONYMOUS_ACTOR};
    use crate::api::InMemorySlackApi;
    use crate::blocks::{
        SUGGESTION_CATEGORY_BLOCK, SUGGESTION_CONTENT_BLOCK, SUGGESTION_MODAL_CALLBACK,
        SUGGESTION_TITLE_BLOCK,
    };
    use crate::envelope::{BlockActionEvent, ViewSubmissionEvent};
    use crate::handler::{HandlerContext, HandlerError, HandlerResult};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl ActionHandler for Counting {
        async fn handle(
            &self,
            _action: &BlockActionEvent,
            _ctx: &HandlerContext,
        ) -> Result<HandlerResult, HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResult::Processed)
        }
    }

    fn button(action_id: &str, value: Option<&str>) -> BlockActionEvent {
        BlockActionEvent {
            user_id: "U1".into(),
            trigger_id: "trigger-1".into(),
            channel_id: Some("C1".into()),
            action_id: action_id.into(),
            block_id: None,
            value: value.map(str::to_string),
        }
    }

    fn context(repos: Repositories, slack: Arc<InMemorySlackApi>) -> HandlerContext {
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).single().expect("time");
        HandlerContext::new(repos, slack).at(now)
    }

    #[test]
    fn prefix_pattern_matches_only_its_family() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = ActionRegistry::new();
        registry.register_prefix("event_response_", Counting(hits.clone()));

        assert!(registry.resolve("event_response_42").is_some());
        assert!(registry.resolve("event_rsvp_attend").is_none());
    }

    #[tokio::test]
    async fn exact_registration_wins_over_patterns_and_patterns_keep_order() {
        let exact = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = ActionRegistry::new();
        registry.register_prefix("event_", Counting(first.clone()));
        registry.register_prefix("event_response_", Counting(second.clone()));
        registry.register("event_response_special", Counting(exact.clone()));

        let ctx = context(Repositories::in_memory(), Arc::new(InMemorySlackApi::new()));
        for action_id in ["event_response_special", "event_response_1"] {
            let handler = registry.resolve(action_id).expect("resolved");
            handler.handle(&button(action_id, None), &ctx).await.expect("handle");
        }

        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rsvp_button_records_response_and_logs() {
        let repos = Repositories::in_memory();
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(repos.clone(), slack.clone());
        let event = ClubEvent {
            id: EventId("evt_1".into()),
            title: "정기 총회".into(),
            description: None,
            starts_at: ctx.now,
            options: vec!["참석".into(), "불참".into()],
            created_by: "U0".into(),
            created_at: ctx.now,
        };
        repos.events.save(&event).await.expect("save event");

        let action = button("event_response_참석", Some("evt_1"));
        let handler = default_action_registry().resolve(&action.action_id).expect("resolved");
        let result = handler.handle(&action, &ctx).await.expect("handle");

        assert_eq!(result, HandlerResult::Processed);
        let rsvp = repos
            .events
            .find_rsvp(&EventId("evt_1".into()), &MemberId("U1".into()))
            .await
            .expect("find")
            .expect("stored");
        assert_eq!(rsvp.response, "참석");
        let logs = repos.activity.for_day(ctx.now.date_naive()).await.expect("logs");
        assert_eq!(logs[0].activity_type, ActivityType::RsvpRecorded);
        assert_eq!(slack.posted_messages().await.len(), 1);
    }

    #[tokio::test]
    async fn rsvp_with_undeclared_option_is_not_stored() {
        let repos = Repositories::in_memory();
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(repos.clone(), slack.clone());
        let event = ClubEvent {
            id: EventId("evt_1".into()),
            title: "MT".into(),
            description: None,
            starts_at: ctx.now,
            options: vec!["참석".into()],
            created_by: "U0".into(),
            created_at: ctx.now,
        };
        repos.events.save(&event).await.expect("save event");

        let action = button("event_response_미정", Some("evt_1"));
        let handler = default_action_registry().resolve(&action.action_id).expect("resolved");
        handler.handle(&action, &ctx).await.expect("handle");

        let stored = repos
            .events
            .find_rsvp(&EventId("evt_1".into()), &MemberId("U1".into()))
            .await
            .expect("find");
        assert!(stored.is_none());
    }

    fn view(values: &[(&str, &str, &str)]) -> ViewSubmissionEvent {
        let mut map: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (block, action, value) in values {
            map.entry(block.to_string()).or_default().insert(action.to_string(), value.to_string());
        }
        ViewSubmissionEvent {
            user_id: "U1".into(),
            callback_id: SUGGESTION_MODAL_CALLBACK.into(),
            private_metadata: None,
            values: map,
        }
    }

    #[tokio::test]
    async fn suggestion_submission_is_stored_anonymously() {
        let repos = Repositories::in_memory();
        let slack = Arc::new(InMemorySlackApi::new());
        let ctx = context(repos.clone(), slack.clone());
        let submission = view(&[
            ("suggestion_category", "category", "facility"),
            ("suggestion_title", "title", "동방 조명"),
            ("suggestion_content", "content", "형광등이 깜빡여요"),
        ]);

        let handler =
            default_action_registry().resolve_view(SUGGESTION_MODAL_CALLBACK).expect("registered");
        let result = handler.handle(&submission, &ctx).await.expect("handle");

        assert_eq!(result, HandlerResult::Processed);
        let stored = repos.suggestions.list(None).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "동방 조명");

        let logs = repos.activity.for_day(ctx.now.date_naive()).await.expect("logs");
        assert_eq!(logs[0].activity_type, ActivityType::SuggestionSubmitted);
        assert_eq!(logs[0].actor_id, ANONYMOUS_ACTOR);
    }

    #[tokio::test]
    async fn incomplete_submission_returns_field_errors() {
        let repos = Repositories::in_memory();
        let ctx = context(repos.clone(), Arc::new(InMemorySlackApi::new()));
        let submission = view(&[("suggestion_category", "category", "unknown")]);

        let handler =
            default_action_registry().resolve_view(SUGGESTION_MODAL_CALLBACK).expect("registered");
        let result = handler.handle(&submission, &ctx).await.expect("handle");

        let HandlerResult::ViewErrors(errors) = result else {
            panic!("expected view errors");
        };
        let blocks: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(
            blocks,
            [SUGGESTION_CATEGORY_BLOCK, SUGGESTION_CONTENT_BLOCK, SUGGESTION_TITLE_BLOCK]
        );
        assert!(repos.suggestions.list(None).await.expect("list").is_empty());
    }
}
