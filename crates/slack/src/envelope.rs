//! Inbound Slack payloads and their normalized envelope form.
//!
//! Three HTTP surfaces feed the bot: slash commands (form encoded), the Events
//! API (JSON) and interactivity (form field `payload` holding JSON). Each is
//! parsed here into one [`SlackEnvelope`] so dispatch never sees wire formats.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    Lifecycle(LifecycleEvent),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SlashCommand(_) => "slash_command",
            Self::Lifecycle(_) => "lifecycle",
            Self::BlockAction(_) => "block_action",
            Self::ViewSubmission(_) => "view_submission",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// Form body Slack posts for a slash command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub real_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: SlackProfile,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl SlackUser {
    /// The name Slack shows in the member list, falling back to the real name and handle.
    pub fn display_name(&self) -> String {
        [self.profile.display_name.as_str(), self.profile.real_name.as_str(), self.name.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    pub fn real_name(&self) -> String {
        let profile = self.profile.real_name.trim();
        if !profile.is_empty() {
            return profile.to_string();
        }
        self.real_name.as_deref().unwrap_or_default().trim().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    TeamJoin { user: SlackUser },
    UserChange { user: SlackUser },
    AppMention(AppMentionEvent),
}

impl LifecycleEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TeamJoin { .. } => "team_join",
            Self::UserChange { .. } => "user_change",
            Self::AppMention(_) => "app_mention",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppMentionEvent {
    pub user: String,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub user_id: String,
    pub trigger_id: String,
    pub channel_id: Option<String>,
    pub action_id: String,
    pub block_id: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub callback_id: String,
    pub private_metadata: Option<String>,
    /// Submitted input values keyed by block id, then action id.
    pub values: BTreeMap<String, BTreeMap<String, String>>,
}

impl ViewSubmissionEvent {
    pub fn value(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.values
            .get(block_id)
            .and_then(|inputs| inputs.get(action_id))
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed slack payload: {0}")]
    Malformed(String),
}

/// Body of a POST to the Events API endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsApiRequest {
    UrlVerification { challenge: String },
    Callback(SlackEnvelope),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEventsApiBody {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: String,
        event: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawUserEvent {
    user: SlackUser,
}

pub fn parse_events_api(body: &[u8]) -> Result<EventsApiRequest, EnvelopeError> {
    let raw: RawEventsApiBody = serde_json::from_slice(body)
        .map_err(|error| EnvelopeError::Malformed(format!("events body: {error}")))?;

    match raw {
        RawEventsApiBody::UrlVerification { challenge } => {
            Ok(EventsApiRequest::UrlVerification { challenge })
        }
        RawEventsApiBody::EventCallback { event_id, event } => {
            let event = parse_callback_event(event)?;
            Ok(EventsApiRequest::Callback(SlackEnvelope { envelope_id: event_id, event }))
        }
        RawEventsApiBody::Other => Ok(EventsApiRequest::Callback(SlackEnvelope {
            envelope_id: String::new(),
            event: SlackEvent::Unsupported { event_type: "unknown_envelope".to_string() },
        })),
    }
}

fn parse_callback_event(event: Value) -> Result<SlackEvent, EnvelopeError> {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let malformed =
        |error: serde_json::Error| EnvelopeError::Malformed(format!("{event_type} event: {error}"));

    let lifecycle = match event_type.as_str() {
        "team_join" => {
            let raw: RawUserEvent = serde_json::from_value(event).map_err(malformed)?;
            LifecycleEvent::TeamJoin { user: raw.user }
        }
        "user_change" => {
            let raw: RawUserEvent = serde_json::from_value(event).map_err(malformed)?;
            LifecycleEvent::UserChange { user: raw.user }
        }
        "app_mention" => {
            LifecycleEvent::AppMention(serde_json::from_value(event).map_err(malformed)?)
        }
        _ => return Ok(SlackEvent::Unsupported { event_type }),
    };
    Ok(SlackEvent::Lifecycle(lifecycle))
}

pub fn parse_slash_command(body: &[u8]) -> Result<SlackEnvelope, EnvelopeError> {
    let payload: SlashCommandPayload = serde_urlencoded::from_bytes(body)
        .map_err(|error| EnvelopeError::Malformed(format!("slash command form: {error}")))?;
    Ok(SlackEnvelope {
        envelope_id: payload.trigger_id.clone(),
        event: SlackEvent::SlashCommand(payload),
    })
}

#[derive(Deserialize)]
struct InteractionForm {
    payload: String,
}

#[derive(Deserialize)]
struct RawIdHolder {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    #[serde(default)]
    block_id: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct RawView {
    callback_id: String,
    #[serde(default)]
    private_metadata: Option<String>,
    #[serde(default)]
    state: Option<RawViewState>,
}

#[derive(Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawInteraction {
    BlockActions {
        user: RawIdHolder,
        #[serde(default)]
        trigger_id: String,
        #[serde(default)]
        channel: Option<RawIdHolder>,
        #[serde(default)]
        actions: Vec<RawAction>,
    },
    ViewSubmission {
        user: RawIdHolder,
        view: RawView,
    },
    #[serde(other)]
    Other,
}

/// Parses the form body of an interactivity request.
///
/// Slack batches at most one action per `block_actions` payload in practice;
/// only the first action is dispatched.
pub fn parse_interaction(body: &[u8]) -> Result<SlackEnvelope, EnvelopeError> {
    let form: InteractionForm = serde_urlencoded::from_bytes(body)
        .map_err(|error| EnvelopeError::Malformed(format!("interaction form: {error}")))?;
    parse_interaction_payload(&form.payload)
}

pub fn parse_interaction_payload(payload: &str) -> Result<SlackEnvelope, EnvelopeError> {
    let raw: RawInteraction = serde_json::from_str(payload)
        .map_err(|error| EnvelopeError::Malformed(format!("interaction payload: {error}")))?;

    let event = match raw {
        RawInteraction::BlockActions { user, trigger_id, channel, actions } => {
            let Some(action) = actions.into_iter().next() else {
                return Ok(SlackEnvelope {
                    envelope_id: trigger_id,
                    event: SlackEvent::Unsupported { event_type: "block_actions".to_string() },
                });
            };
            let event = BlockActionEvent {
                user_id: user.id,
                trigger_id: trigger_id.clone(),
                channel_id: channel.map(|channel| channel.id),
                action_id: action.action_id,
                block_id: action.block_id,
                value: action.value,
            };
            return Ok(SlackEnvelope {
                envelope_id: trigger_id,
                event: SlackEvent::BlockAction(event),
            });
        }
        RawInteraction::ViewSubmission { user, view } => {
            let values = view
                .state
                .map(|state| flatten_view_values(state.values))
                .unwrap_or_default();
            SlackEvent::ViewSubmission(ViewSubmissionEvent {
                user_id: user.id,
                callback_id: view.callback_id,
                private_metadata: view.private_metadata.filter(|meta| !meta.is_empty()),
                values,
            })
        }
        RawInteraction::Other => SlackEvent::Unsupported { event_type: "interaction".to_string() },
    };

    Ok(SlackEnvelope { envelope_id: String::new(), event })
}

fn flatten_view_values(
    raw: BTreeMap<String, BTreeMap<String, Value>>,
) -> BTreeMap<String, BTreeMap<String, String>> {
    raw.into_iter()
        .map(|(block_id, inputs)| {
            let inputs = inputs
                .into_iter()
                .filter_map(|(action_id, input)| {
                    input_value(&input).map(|value| (action_id, value))
                })
                .collect();
            (block_id, inputs)
        })
        .collect()
}

fn input_value(input: &Value) -> Option<String> {
    if let Some(value) = input.get("value").and_then(Value::as_str) {
        return Some(value.to_string());
    }
    input
        .get("selected_option")
        .and_then(|option| option.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
