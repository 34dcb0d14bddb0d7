//! Slack Web API seam.
//!
//! Handlers only talk to Slack through [`SlackApi`], which is injected per
//! invocation. [`HttpSlackApi`] is the production client; [`InMemorySlackApi`]
//! records calls for tests and local runs.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use clubbot_core::config::SlackConfig;

use crate::blocks::{MessageTemplate, ModalView};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
}

/// One page of `conversations.list`; an empty cursor means the listing is complete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelPage {
    pub channels: Vec<SlackChannel>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack transport error: {0}")]
    Transport(String),
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("slack api `{method}` response could not be decoded: {detail}")]
    Decode { method: String, detail: String },
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Posts into a channel or DM and returns the message timestamp.
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackApiError>;

    /// Opens (or reuses) the DM channel with a user.
    async fn open_dm(&self, user_id: &str) -> Result<String, SlackApiError>;

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;

    async fn list_channels_page(&self, cursor: Option<&str>)
        -> Result<ChannelPage, SlackApiError>;

    async fn send_dm(
        &self,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError> {
        let channel = self.open_dm(user_id).await?;
        self.post_message(&channel, message, None).await
    }

    /// Follows continuation cursors until Slack reports no further page.
    async fn list_channels(&self) -> Result<Vec<SlackChannel>, SlackApiError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.list_channels_page(cursor.as_deref()).await?;
            channels.extend(page.channels);
            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(channels)
    }
}

pub struct HttpSlackApi {
    client: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Deserialize)]
struct ResponseMeta {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct ConversationsList {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMeta>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ts: String,
}

#[derive(Deserialize)]
struct DmChannel {
    id: String,
}

#[derive(Deserialize)]
struct ConversationsOpen {
    channel: DmChannel,
}

impl HttpSlackApi {
    pub fn new(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SlackApiError> {
        let response = request
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(format!("{method}: {error}")))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|error| SlackApiError::Decode {
            method: method.to_string(),
            detail: format!("status {status}: {error}"),
        })?;

        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            return Err(SlackApiError::Api { method: method.to_string(), error: error.to_string() });
        }

        debug!(event_name = "slack.api.ok", method, "slack api call succeeded");
        serde_json::from_value(body).map_err(|error| SlackApiError::Decode {
            method: method.to_string(),
            detail: error.to_string(),
        })
    }

    fn post_json(&self, method: &str, body: &Value) -> reqwest::RequestBuilder {
        self.client.post(format!("{}/{method}", self.base_url)).json(body)
    }
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackApiError> {
        let mut body = json!({
            "channel": channel,
            "text": message.fallback_text,
            "blocks": message.blocks,
        });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }

        let response: PostMessageResponse =
            self.call("chat.postMessage", self.post_json("chat.postMessage", &body)).await?;
        Ok(response.ts)
    }

    async fn open_dm(&self, user_id: &str) -> Result<String, SlackApiError> {
        let body = json!({ "users": user_id });
        let response: ConversationsOpen =
            self.call("conversations.open", self.post_json("conversations.open", &body)).await?;
        Ok(response.channel.id)
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        let _: Value = self.call("views.open", self.post_json("views.open", &body)).await?;
        Ok(())
    }

    async fn list_channels_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<ChannelPage, SlackApiError> {
        let mut query =
            vec![("limit", "200"), ("exclude_archived", "true"), ("types", "public_channel")];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let request =
            self.client.get(format!("{}/conversations.list", self.base_url)).query(&query);

        let response: ConversationsList = self.call("conversations.list", request).await?;
        Ok(ChannelPage {
            channels: response.channels,
            next_cursor: response
                .response_metadata
                .map(|meta| meta.next_cursor)
                .filter(|cursor| !cursor.is_empty()),
        })
    }
}

/// A call observed by [`InMemorySlackApi`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    PostMessage { channel: String, message: MessageTemplate, thread_ts: Option<String> },
    OpenDm { user_id: String },
    OpenView { trigger_id: String, view: ModalView },
    ListChannels { cursor: Option<String> },
}

#[derive(Default)]
pub struct InMemorySlackApi {
    calls: Mutex<Vec<RecordedCall>>,
    channel_pages: Vec<Vec<SlackChannel>>,
    unreachable_users: HashSet<String>,
}

impl InMemorySlackApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `pages` from `conversations.list`, one page per cursor step.
    pub fn with_channel_pages(mut self, pages: Vec<Vec<SlackChannel>>) -> Self {
        self.channel_pages = pages;
        self
    }

    /// DMs to this user fail with `cannot_dm_bot`.
    pub fn with_unreachable_user(mut self, user_id: impl Into<String>) -> Self {
        self.unreachable_users.insert(user_id.into());
        self
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Messages posted so far as `(channel, message)` pairs.
    pub async fn posted_messages(&self) -> Vec<(String, MessageTemplate)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCall::PostMessage { channel, message, .. } => {
                    Some((channel.clone(), message.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub async fn opened_views(&self) -> Vec<ModalView> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCall::OpenView { view, .. } => Some(view.clone()),
                _ => None,
            })
            .collect()
    }
}

/// DM channel ids in the fake are derived from the user id.
pub fn fake_dm_channel(user_id: &str) -> String {
    format!("D-{user_id}")
}

#[async_trait]
impl SlackApi for InMemorySlackApi {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackApiError> {
        let mut calls = self.calls.lock().await;
        calls.push(RecordedCall::PostMessage {
            channel: channel.to_string(),
            message: message.clone(),
            thread_ts: thread_ts.map(str::to_string),
        });
        Ok(format!("{}.000100", calls.len()))
    }

    async fn open_dm(&self, user_id: &str) -> Result<String, SlackApiError> {
        self.calls.lock().await.push(RecordedCall::OpenDm { user_id: user_id.to_string() });
        if self.unreachable_users.contains(user_id) {
            return Err(SlackApiError::Api {
                method: "conversations.open".to_string(),
                error: "cannot_dm_bot".to_string(),
            });
        }
        Ok(fake_dm_channel(user_id))
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.calls
            .lock()
            .await
            .push(RecordedCall::OpenView {
                trigger_id: trigger_id.to_string(),
                view: view.clone(),
            });
        Ok(())
    }

    async fn list_channels_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<ChannelPage, SlackApiError> {
        self.calls
            .lock()
            .await
            .push(RecordedCall::ListChannels { cursor: cursor.map(str::to_string) });

        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| SlackApiError::Api {
                    method: "conversations.list".to_string(),
                    error: "invalid_cursor".to_string(),
                })?,
        };

        let channels = self.channel_pages.get(index).cloned().unwrap_or_default();
        let next_cursor =
            (index + 1 < self.channel_pages.len()).then(|| format!("page-{}", index + 1));
        Ok(ChannelPage { channels, next_cursor })
    }
}
