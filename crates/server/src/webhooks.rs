//! Inbound third-party callbacks under `/api/webhooks`.
//!
//! - `POST /api/webhooks/submissions` - membership form submission
//! - `POST /api/webhooks/payments`    - bank deposit notification
//!
//! Both ingesters store the record, then try to reconcile it against the
//! open records on the other side.

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use clubbot_core::domain::activity::{ActivityLog, ActivityType};
use clubbot_core::domain::payment::{
    find_deposit_for, find_submission_for, Deposit, DepositStatus, PaymentMatch, Submission,
    SubmissionStatus,
};
use clubbot_core::ids::generate_uuid;
use clubbot_db::repositories::payment::MatchOutcome;
use clubbot_db::Repositories;

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

pub const WEBHOOK_PREFIX: &str = "/api/webhooks";

const WEBHOOK_ACTOR: &str = "webhook";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookRoute {
    Submission,
    Payment,
}

/// Resolves a request to an ingester; the error carries the path with the prefix removed.
pub fn route(method: &Method, path: &str) -> Result<WebhookRoute, String> {
    let stripped = path.strip_prefix(WEBHOOK_PREFIX).unwrap_or(path);
    let stripped = if stripped.is_empty() { "/" } else { stripped };

    match (method, stripped) {
        (&Method::POST, "/submissions") => Ok(WebhookRoute::Submission),
        (&Method::POST, "/payments") => Ok(WebhookRoute::Payment),
        _ => Err(stripped.to_string()),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(WEBHOOK_PREFIX, any(webhook))
        .route(&format!("{WEBHOOK_PREFIX}/{{*path}}"), any(webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub respondent_name: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Defaults to the respondent when the form leaves it blank.
    #[serde(default)]
    pub depositor_name: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub form_response_id: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub depositor_name: String,
    pub amount: i64,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub raw_message: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAccepted {
    pub submission: Submission,
    pub payment_match: Option<PaymentMatch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccepted {
    pub deposit: Deposit,
    pub payment_match: Option<PaymentMatch>,
}

async fn webhook(State(state): State<AppState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let correlation_id = generate_uuid();
    let route = match route(&method, uri.path()) {
        Ok(route) => route,
        Err(stripped) => {
            warn!(
                event_name = "webhook.unknown_path",
                correlation_id = %correlation_id,
                method = %method,
                path = %stripped,
                "unknown webhook path"
            );
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::failure(format!("Unknown webhook path: {stripped}"))),
            )
                .into_response();
        }
    };

    let now = Utc::now();
    let result = match route {
        WebhookRoute::Submission => match parse_body::<SubmissionPayload>(&body, &correlation_id) {
            Ok(payload) => ingest_submission(&state.repos, payload, now, &correlation_id)
                .await
                .map(|accepted| Json(ApiResponse::ok(accepted)).into_response()),
            Err(error) => Err(error),
        },
        WebhookRoute::Payment => match parse_body::<PaymentPayload>(&body, &correlation_id) {
            Ok(payload) => ingest_payment(&state.repos, payload, now, &correlation_id)
                .await
                .map(|accepted| Json(ApiResponse::ok(accepted)).into_response()),
            Err(error) => Err(error),
        },
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

fn parse_body<T: DeserializeOwned>(body: &[u8], correlation_id: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|error| {
        ApiError::bad_request(format!("Invalid request body: {error}"), correlation_id)
    })
}

pub async fn ingest_submission(
    repos: &Repositories,
    payload: SubmissionPayload,
    now: DateTime<Utc>,
    correlation_id: &str,
) -> Result<SubmissionAccepted, ApiError> {
    let respondent_name = payload.respondent_name.trim().to_string();
    if respondent_name.is_empty() {
        return Err(ApiError::bad_request("respondentName is required", correlation_id));
    }
    if payload.amount <= 0 {
        return Err(ApiError::bad_request("amount must be positive", correlation_id));
    }
    let depositor_name = payload
        .depositor_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| respondent_name.clone());

    let submission = Submission {
        id: Submission::new_id(),
        respondent_name,
        student_id: payload.student_id,
        email: payload.email,
        depositor_name,
        amount: payload.amount,
        form_response_id: payload.form_response_id,
        status: SubmissionStatus::Pending,
        submitted_at: payload.submitted_at.unwrap_or(now),
        matched_deposit_id: None,
    };
    let storage = |error| ApiError::from_repository(error, correlation_id);

    repos.payments.save_submission(&submission).await.map_err(storage)?;
    repos
        .activity
        .append(&ActivityLog::record(
            ActivityType::SubmissionReceived,
            WEBHOOK_ACTOR,
            Some(submission.id.0.clone()),
            json!({ "amount": submission.amount, "depositorName": submission.depositor_name }),
            now,
        ))
        .await
        .map_err(storage)?;
    info!(
        event_name = "webhook.submission.received",
        correlation_id = %correlation_id,
        submission_id = %submission.id.0,
        amount = submission.amount,
        "form submission stored"
    );

    let deposits = repos.payments.unmatched_deposits().await.map_err(storage)?;
    let Some(deposit) = find_deposit_for(&submission, &deposits).cloned() else {
        return Ok(SubmissionAccepted { submission, payment_match: None });
    };

    let outcome = repos.payments.record_match(submission, deposit, now).await.map_err(storage)?;
    log_match(repos, &outcome, now, correlation_id).await.map_err(storage)?;
    Ok(SubmissionAccepted {
        submission: outcome.submission,
        payment_match: Some(outcome.payment_match),
    })
}

pub async fn ingest_payment(
    repos: &Repositories,
    payload: PaymentPayload,
    now: DateTime<Utc>,
    correlation_id: &str,
) -> Result<PaymentAccepted, ApiError> {
    let depositor_name = payload.depositor_name.trim().to_string();
    if depositor_name.is_empty() {
        return Err(ApiError::bad_request("depositorName is required", correlation_id));
    }
    if payload.amount <= 0 {
        return Err(ApiError::bad_request("amount must be positive", correlation_id));
    }

    let deposit = Deposit {
        id: Deposit::new_id(),
        depositor_name,
        amount: payload.amount,
        bank: payload.bank,
        raw_message: payload.raw_message,
        status: DepositStatus::Unmatched,
        received_at: payload.received_at.unwrap_or(now),
        matched_submission_id: None,
    };
    let storage = |error| ApiError::from_repository(error, correlation_id);

    repos.payments.save_deposit(&deposit).await.map_err(storage)?;
    repos
        .activity
        .append(&ActivityLog::record(
            ActivityType::DepositReceived,
            WEBHOOK_ACTOR,
            Some(deposit.id.0.clone()),
            json!({ "amount": deposit.amount, "depositorName": deposit.depositor_name }),
            now,
        ))
        .await
        .map_err(storage)?;
    info!(
        event_name = "webhook.payment.received",
        correlation_id = %correlation_id,
        deposit_id = %deposit.id.0,
        amount = deposit.amount,
        "deposit notification stored"
    );

    let submissions = repos.payments.pending_submissions().await.map_err(storage)?;
    let Some(submission) = find_submission_for(&deposit, &submissions).cloned() else {
        return Ok(PaymentAccepted { deposit, payment_match: None });
    };

    let outcome = repos.payments.record_match(submission, deposit, now).await.map_err(storage)?;
    log_match(repos, &outcome, now, correlation_id).await.map_err(storage)?;
    Ok(PaymentAccepted { deposit: outcome.deposit, payment_match: Some(outcome.payment_match) })
}

async fn log_match(
    repos: &Repositories,
    outcome: &MatchOutcome,
    now: DateTime<Utc>,
    correlation_id: &str,
) -> Result<(), clubbot_db::RepositoryError> {
    repos
        .activity
        .append(&ActivityLog::record(
            ActivityType::PaymentMatched,
            WEBHOOK_ACTOR,
            Some(outcome.submission.id.0.clone()),
            json!({
                "depositId": outcome.deposit.id.0,
                "matchId": outcome.payment_match.id.0,
                "amount": outcome.payment_match.amount,
            }),
            now,
        ))
        .await?;
    info!(
        event_name = "webhook.payment.matched",
        correlation_id = %correlation_id,
        submission_id = %outcome.submission.id.0,
        deposit_id = %outcome.deposit.id.0,
        "submission reconciled with deposit"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use clubbot_core::config::AppConfig;
    use clubbot_core::domain::payment::{DepositStatus, SubmissionStatus};
    use clubbot_db::Repositories;
    use clubbot_slack::InMemorySlackApi;

    use super::{route, router, WebhookRoute};
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new(
            AppConfig::default(),
            Repositories::in_memory(),
            Arc::new(InMemorySlackApi::new()),
        )
    }

    async fn call(state: &AppState, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[test]
    fn route_table_requires_exact_path_and_post() {
        assert_eq!(route(&Method::POST, "/api/webhooks/submissions"), Ok(WebhookRoute::Submission));
        assert_eq!(route(&Method::POST, "/api/webhooks/payments"), Ok(WebhookRoute::Payment));
        assert_eq!(route(&Method::GET, "/api/webhooks/submissions"), Err("/submissions".into()));
        assert_eq!(route(&Method::POST, "/api/webhooks/unknown"), Err("/unknown".into()));
        assert_eq!(
            route(&Method::POST, "/api/webhooks/submissions/x"),
            Err("/submissions/x".into())
        );
    }

    #[tokio::test]
    async fn unknown_path_returns_404_with_path() {
        let (status, body) = call(&state(), Method::POST, "/api/webhooks/unknown", "{}").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "success": false, "error": "Unknown webhook path: /unknown" }));
    }

    #[tokio::test]
    async fn wrong_method_returns_404() {
        let (status, body) = call(&state(), Method::GET, "/api/webhooks/submissions", "").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown webhook path: /submissions");
    }

    #[tokio::test]
    async fn malformed_body_returns_400() {
        let (status, body) = call(&state(), Method::POST, "/api/webhooks/payments", "{oops").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn submission_then_payment_reconciles() {
        let state = state();

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/webhooks/submissions",
            &json!({ "respondentName": "홍길동", "studentId": "2023123456", "amount": 30000 })
                .to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["submission"]["status"], "pending");
        assert_eq!(body["data"]["paymentMatch"], Value::Null);

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/webhooks/payments",
            &json!({ "depositorName": "홍 길동", "amount": 30000, "bank": "국민" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deposit"]["status"], "matched");
        assert_eq!(body["data"]["paymentMatch"]["amount"], 30000);

        assert!(state.repos.payments.pending_submissions().await.expect("pending").is_empty());
        assert!(state.repos.payments.unmatched_deposits().await.expect("unmatched").is_empty());
    }

    #[tokio::test]
    async fn amount_mismatch_leaves_both_open() {
        let state = state();
        call(
            &state,
            Method::POST,
            "/api/webhooks/payments",
            &json!({ "depositorName": "김철수", "amount": 20000 }).to_string(),
        )
        .await;
        let (_, body) = call(
            &state,
            Method::POST,
            "/api/webhooks/submissions",
            &json!({ "respondentName": "김철수", "amount": 30000 }).to_string(),
        )
        .await;

        assert_eq!(body["data"]["paymentMatch"], Value::Null);
        let pending = state.repos.payments.pending_submissions().await.expect("pending");
        let unmatched = state.repos.payments.unmatched_deposits().await.expect("unmatched");
        assert_eq!(pending[0].status, SubmissionStatus::Pending);
        assert_eq!(unmatched[0].status, DepositStatus::Unmatched);
    }

    #[tokio::test]
    async fn storage_failure_returns_generic_500() {
        let table = clubbot_db::SingleTable::new(Arc::new({
            let store = clubbot_db::InMemoryTableStore::default();
            store.set_available(false);
            store
        }));
        let state = AppState::new(
            AppConfig::default(),
            Repositories::new(table),
            Arc::new(InMemorySlackApi::new()),
        );

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/webhooks/payments",
            &json!({ "depositorName": "김철수", "amount": 20000 }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "success": false, "error": "Internal server error" }));
    }
}
