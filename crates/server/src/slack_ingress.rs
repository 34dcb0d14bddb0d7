//! HTTP endpoints Slack calls: Events API, slash commands and interactivity.
//!
//! Bodies are read raw so the request signature can be checked before parsing.
//! Events are always acknowledged with 200 once verified; a failing handler is
//! logged instead of surfaced, since Slack would otherwise redeliver the event.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use clubbot_core::ids::generate_uuid;
use clubbot_slack::blocks::{error_message, MessageTemplate};
use clubbot_slack::envelope::{
    parse_events_api, parse_interaction, parse_slash_command, EventsApiRequest, SlackEnvelope,
};
use clubbot_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use clubbot_slack::{DispatchError, HandlerResult};

use crate::error::ApiError;
use crate::state::AppState;

const COMMAND_FAILURE_SUMMARY: &str =
    "요청을 처리하지 못했어요. 잠시 후 다시 시도해 주세요.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(events))
        .route("/slack/commands", post(commands))
        .route("/slack/interactions", post(interactions))
        .with_state(state)
}

fn verify(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    correlation_id: &str,
) -> Result<(), ApiError> {
    let Some(verifier) = state.verifier.as_ref() else {
        return Ok(());
    };
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    verifier
        .verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), body, Utc::now().timestamp())
        .map_err(|error| {
            warn!(
                event_name = "slack.ingress.signature_rejected",
                correlation_id = %correlation_id,
                error = %error,
                "slack request signature rejected"
            );
            ApiError::unauthorized("invalid slack signature", correlation_id)
        })
}

async fn dispatch(
    state: &AppState,
    envelope: &SlackEnvelope,
    correlation_id: &str,
) -> Result<HandlerResult, DispatchError> {
    let ctx = state.handler_context().with_correlation_id(correlation_id);
    state.dispatcher.dispatch(envelope, &ctx).await
}

fn ephemeral(message: &MessageTemplate) -> Response {
    Json(json!({
        "response_type": "ephemeral",
        "text": message.fallback_text,
        "blocks": message.blocks,
    }))
    .into_response()
}

fn acknowledge(result: HandlerResult) -> Response {
    match result {
        HandlerResult::Responded(message) => ephemeral(&message),
        HandlerResult::ViewErrors(errors) => {
            Json(json!({ "response_action": "errors", "errors": errors })).into_response()
        }
        HandlerResult::Processed | HandlerResult::Ignored => StatusCode::OK.into_response(),
    }
}

async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let correlation_id = generate_uuid();
    verify(&state, &headers, &body, &correlation_id)?;

    let request = parse_events_api(&body)
        .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?;
    let envelope = match request {
        EventsApiRequest::UrlVerification { challenge } => {
            return Ok(Json(json!({ "challenge": challenge })).into_response());
        }
        EventsApiRequest::Callback(envelope) => envelope,
    };

    if let Err(failure) = dispatch(&state, &envelope, &correlation_id).await {
        error!(
            event_name = "slack.ingress.event_failed",
            correlation_id = %correlation_id,
            discriminator = %failure.discriminator,
            error = %failure.source,
            "slack event handler failed"
        );
    }
    Ok(StatusCode::OK.into_response())
}

async fn commands(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let correlation_id = generate_uuid();
    verify(&state, &headers, &body, &correlation_id)?;

    let envelope = parse_slash_command(&body)
        .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?;
    match dispatch(&state, &envelope, &correlation_id).await {
        Ok(result) => Ok(acknowledge(result)),
        Err(failure) => {
            error!(
                event_name = "slack.ingress.command_failed",
                correlation_id = %correlation_id,
                discriminator = %failure.discriminator,
                error = %failure.source,
                "slash command handler failed"
            );
            Ok(ephemeral(&error_message(COMMAND_FAILURE_SUMMARY, &correlation_id)))
        }
    }
}

async fn interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let correlation_id = generate_uuid();
    verify(&state, &headers, &body, &correlation_id)?;

    let envelope = parse_interaction(&body)
        .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?;
    let result = dispatch(&state, &envelope, &correlation_id).await.map_err(|failure| {
        ApiError::internal(
            format!("interaction `{}` failed: {}", failure.discriminator, failure.source),
            &correlation_id,
        )
    })?;
    Ok(acknowledge(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use clubbot_core::config::AppConfig;
    use clubbot_db::Repositories;
    use clubbot_slack::signature::{compute_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use clubbot_slack::InMemorySlackApi;

    use super::router;
    use crate::state::AppState;

    const SECRET: &str = "test-signing-secret";

    fn app(signing_secret: Option<&str>) -> (Router, Arc<InMemorySlackApi>) {
        let mut config = AppConfig::default();
        config.slack.signing_secret =
            signing_secret.map(|secret| SecretString::from(secret.to_string()));
        let slack = Arc::new(InMemorySlackApi::new());
        let state = AppState::new(config, Repositories::in_memory(), slack.clone());
        (router(state), slack)
    }

    fn form(pairs: &[(&str, &str)]) -> String {
        serde_urlencoded::to_string(pairs).expect("encode form")
    }

    async fn post(
        app: &Router,
        uri: &str,
        content_type: &str,
        body: String,
        signed: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder =
            Request::builder().method("POST").uri(uri).header(header::CONTENT_TYPE, content_type);
        if let Some(secret) = signed {
            let timestamp = Utc::now().timestamp().to_string();
            builder = builder
                .header(TIMESTAMP_HEADER, &timestamp)
                .header(SIGNATURE_HEADER, compute_signature(secret, &timestamp, body.as_bytes()));
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::from(body)).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, value)
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let (app, _) = app(None);
        let body = json!({
            "type": "url_verification",
            "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        });

        let (status, reply) =
            post(&app, "/slack/events", "application/json", body.to_string(), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["challenge"], "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P");
    }

    #[tokio::test]
    async fn guide_command_returns_ephemeral_guide() {
        let (app, _) = app(None);
        let body = form(&[
            ("command", "/가이드"),
            ("text", ""),
            ("user_id", "U1"),
            ("channel_id", "C1"),
        ]);

        let (status, reply) =
            post(&app, "/slack/commands", "application/x-www-form-urlencoded", body, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["response_type"], "ephemeral");
        assert_eq!(reply["text"], "동아리 봇 사용 가이드");
        assert!(reply["blocks"].as_array().is_some_and(|blocks| !blocks.is_empty()));
    }

    #[tokio::test]
    async fn unknown_command_is_acknowledged_silently() {
        let (app, slack) = app(None);
        let body = form(&[("command", "/출석"), ("user_id", "U1")]);

        let (status, reply) =
            post(&app, "/slack/commands", "application/x-www-form-urlencoded", body, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, Value::Null);
        assert!(slack.calls().await.is_empty());
    }

    #[tokio::test]
    async fn incomplete_suggestion_modal_returns_field_errors() {
        let (app, _) = app(None);
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "callback_id": "suggestion_modal",
                "state": { "values": {
                    "suggestion_category": {
                        "category": { "selected_option": { "value": "event" } }
                    },
                    "suggestion_title": { "title": { "value": "  " } },
                    "suggestion_content": { "content": { "value": "본문" } }
                } }
            }
        });
        let payload = payload.to_string();
        let body = form(&[("payload", payload.as_str())]);

        let (status, reply) = post(
            &app,
            "/slack/interactions",
            "application/x-www-form-urlencoded",
            body,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["response_action"], "errors");
        assert_eq!(reply["errors"]["suggestion_title"], "제목을 입력해 주세요.");
        assert!(reply["errors"].get("suggestion_content").is_none());
    }

    #[tokio::test]
    async fn signed_requests_are_required_when_secret_configured() {
        let (app, _) = app(Some(SECRET));
        let body = json!({ "type": "url_verification", "challenge": "abc" }).to_string();

        let json = "application/json";
        let (unsigned, _) = post(&app, "/slack/events", json, body.clone(), None).await;
        let (forged, _) =
            post(&app, "/slack/events", json, body.clone(), Some("other-secret")).await;
        let (signed, reply) = post(&app, "/slack/events", json, body, Some(SECRET)).await;

        assert_eq!(unsigned, StatusCode::UNAUTHORIZED);
        assert_eq!(forged, StatusCode::UNAUTHORIZED);
        assert_eq!(signed, StatusCode::OK);
        assert_eq!(reply["challenge"], "abc");
    }

    #[tokio::test]
    async fn malformed_event_body_is_bad_request() {
        let (app, _) = app(None);

        let (status, reply) =
            post(&app, "/slack/events", "application/json", "{not json".into(), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["success"], false);
    }
}
