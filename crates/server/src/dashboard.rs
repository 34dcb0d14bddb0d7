//! Admin dashboard API.
//!
//! - `POST  /api/auth/login`            - credential check, sets the session cookie
//! - `POST  /api/auth/logout`           - clears the session cookie
//! - `GET   /api/slack/channels`        - workspace channels, sorted by name
//! - `GET   /api/suggestions?status=`   - suggestions, newest first
//! - `PATCH /api/suggestions/{id}`      - status transition with optional admin note
//! - `GET   /api/members`               - members in join order
//! - `POST  /api/members/{id}/warn`     - name-format warning DM
//! - `GET   /api/activity?date=`        - one day of activity, oldest first
//!
//! Every route except login and logout requires the `club_session` cookie.
//! With `dashboard.verify_sessions` the token must also match a live session;
//! sessions are only stored while that flag is on.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, NaiveDate, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use clubbot_core::domain::activity::{ActivityLog, ActivityType};
use clubbot_core::domain::member::{Member, MemberId};
use clubbot_core::domain::session::Session;
use clubbot_core::domain::suggestion::{Suggestion, SuggestionId, SuggestionStatus};
use clubbot_core::ids::generate_uuid;
use clubbot_slack::warnings::send_name_warning;
use clubbot_slack::SlackChannel;

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "club_session";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "아이디 또는 비밀번호가 올바르지 않습니다.";
pub const LOGIN_REQUIRED_MESSAGE: &str = "로그인이 필요합니다.";
const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/slack/channels", get(list_channels))
        .route("/api/suggestions", get(list_suggestions))
        .route("/api/suggestions/{id}", patch(update_suggestion))
        .route("/api/members", get(list_members))
        .route("/api/members/{id}/warn", post(warn_member))
        .route("/api/activity", get(list_activity))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionUpdate {
    pub status: SuggestionStatus,
    #[serde(default)]
    pub admin_note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub date: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ApiError> {
    let correlation_id = generate_uuid();
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &correlation_id))?;

    let dashboard = &state.config.dashboard;
    if request.username != dashboard.username
        || request.password != dashboard.password.expose_secret()
    {
        warn!(
            event_name = "dashboard.login.rejected",
            correlation_id = %correlation_id,
            username = %request.username,
            "dashboard login rejected"
        );
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE, &correlation_id));
    }

    let now = Utc::now();
    let ttl_secs = i64::try_from(dashboard.session_ttl_secs)
        .unwrap_or(i64::MAX)
        .min(MAX_SESSION_TTL_SECS);
    let ttl = Duration::seconds(ttl_secs);
    let session = Session::issue(&request.username, ttl, now);
    let storage = |error| ApiError::from_repository(error, &correlation_id);
    if dashboard.verify_sessions {
        state.repos.sessions.create(&session).await.map_err(storage)?;
        let purged =
            state.repos.sessions.purge_expired(&request.username, now).await.map_err(storage)?;
        if purged > 0 {
            debug!(
                event_name = "dashboard.session.purged",
                correlation_id = %correlation_id,
                purged,
                "expired dashboard sessions deleted"
            );
        }
    }
    state
        .repos
        .activity
        .append(&ActivityLog::record(
            ActivityType::DashboardLogin,
            request.username.clone(),
            None,
            json!({}),
            now,
        ))
        .await
        .map_err(storage)?;

    info!(
        event_name = "dashboard.login.succeeded",
        correlation_id = %correlation_id,
        username = %request.username,
        "dashboard login succeeded"
    );

    let cookie = Cookie::build((SESSION_COOKIE, session.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(dashboard.secure_cookie);
    Ok((jar.add(cookie), Json(ApiResponse::done())))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let correlation_id = generate_uuid();
        state
            .repos
            .sessions
            .revoke(cookie.value())
            .await
            .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    }

    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");
    Ok((jar.remove(removal), Json(ApiResponse::done())))
}

async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let correlation_id = generate_uuid();
    let Some(token) = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()) else {
        return ApiError::unauthorized(LOGIN_REQUIRED_MESSAGE, &correlation_id).into_response();
    };
    if token.is_empty() {
        return ApiError::unauthorized(LOGIN_REQUIRED_MESSAGE, &correlation_id).into_response();
    }

    if state.config.dashboard.verify_sessions {
        match state.repos.sessions.find_active(&token, Utc::now()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return ApiError::unauthorized(LOGIN_REQUIRED_MESSAGE, &correlation_id)
                    .into_response();
            }
            Err(error) => return ApiError::from_repository(error, &correlation_id).into_response(),
        }
    }

    next.run(request).await
}

async fn list_channels(State(state): State<AppState>) -> Result<Json<Vec<SlackChannel>>, ApiError> {
    let correlation_id = generate_uuid();
    let mut channels = state.slack.list_channels().await.map_err(|error| {
        ApiError::internal(format!("channel listing failed: {error}"), &correlation_id)
    })?;
    channels.sort_by(|left, right| left.name.cmp(&right.name).then_with(|| left.id.cmp(&right.id)));
    Ok(Json(channels))
}

async fn list_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let correlation_id = generate_uuid();
    let status = match query.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(
            raw.parse::<SuggestionStatus>()
                .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?,
        ),
        None => None,
    };

    let suggestions = state
        .repos
        .suggestions
        .list(status)
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    Ok(Json(suggestions))
}

async fn update_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SuggestionUpdate>, JsonRejection>,
) -> Result<Json<Suggestion>, ApiError> {
    let correlation_id = generate_uuid();
    let Json(update) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &correlation_id))?;
    let storage = |error| ApiError::from_repository(error, &correlation_id);

    let id = SuggestionId(id);
    let mut suggestion = state
        .repos
        .suggestions
        .find_by_id(&id)
        .await
        .map_err(storage)?
        .ok_or_else(|| {
            ApiError::not_found(format!("suggestion {} not found", id.0), &correlation_id)
        })?;

    let previous = suggestion.status;
    let now = Utc::now();
    suggestion
        .transition(update.status, update.admin_note, now)
        .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?;
    state.repos.suggestions.save(&suggestion).await.map_err(storage)?;
    state
        .repos
        .activity
        .append(&ActivityLog::record(
            ActivityType::SuggestionStatusChanged,
            state.config.dashboard.username.clone(),
            Some(suggestion.id.0.clone()),
            json!({ "from": previous.as_str(), "to": suggestion.status.as_str() }),
            now,
        ))
        .await
        .map_err(storage)?;

    info!(
        event_name = "dashboard.suggestion.transitioned",
        correlation_id = %correlation_id,
        suggestion_id = %suggestion.id.0,
        from = previous.as_str(),
        to = suggestion.status.as_str(),
        "suggestion status changed"
    );
    Ok(Json(suggestion))
}

async fn list_members(State(state): State<AppState>) -> Result<Json<Vec<Member>>, ApiError> {
    let correlation_id = generate_uuid();
    let members = state
        .repos
        .members
        .list()
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    Ok(Json(members))
}

async fn warn_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let correlation_id = generate_uuid();
    let member = state
        .repos
        .members
        .find_by_id(&MemberId(id.clone()))
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?
        .ok_or_else(|| ApiError::not_found(format!("member {id} not found"), &correlation_id))?;

    let warned = send_name_warning(
        state.slack.as_ref(),
        &state.repos,
        &member,
        &state.config.dashboard.username,
        Utc::now(),
    )
    .await
    .map_err(|error| ApiError::from_handler(error, &correlation_id))?;

    Ok(Json(ApiResponse::with_message(format!(
        "{}님에게 경고 메시지를 보냈습니다. (누적 {}회)",
        warned.display_name, warned.warning_count
    ))))
}

async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    let correlation_id = generate_uuid();
    let day = match query.date.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            ApiError::bad_request(format!("date must be YYYY-MM-DD, got `{raw}`"), &correlation_id)
        })?,
        None => Utc::now().date_naive(),
    };

    let logs = state
        .repos
        .activity
        .for_day(day)
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use clubbot_core::config::AppConfig;
    use clubbot_core::domain::activity::ActivityType;
    use clubbot_core::domain::member::{Member, MemberId};
    use clubbot_core::domain::session::Session;
    use clubbot_core::domain::suggestion::{Suggestion, SuggestionCategory};
    use clubbot_db::Repositories;
    use clubbot_slack::{InMemorySlackApi, SlackChannel};

    use super::{router, INVALID_CREDENTIALS_MESSAGE, SESSION_COOKIE};
    use crate::state::AppState;

    struct Harness {
        app: Router,
        state: AppState,
        slack: Arc<InMemorySlackApi>,
    }

    fn harness_with(config: AppConfig, slack: InMemorySlackApi) -> Harness {
        let slack = Arc::new(slack);
        let state = AppState::new(config, Repositories::in_memory(), slack.clone());
        Harness { app: router(state.clone()), state, slack }
    }

    fn harness() -> Harness {
        harness_with(AppConfig::default(), InMemorySlackApi::new())
    }

    struct Reply {
        status: StatusCode,
        set_cookie: Option<String>,
        body: Value,
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        Reply { status, set_cookie, body }
    }

    fn session_pair(set_cookie: &str) -> String {
        set_cookie.split(';').next().expect("cookie pair").to_string()
    }

    #[tokio::test]
    async fn login_with_default_credentials_sets_cookie() {
        let h = harness();

        let reply = send(
            &h.app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "root", "password": "root" })),
        )
        .await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({ "success": true }));
        let cookie = reply.set_cookie.expect("cookie set");
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));
        assert!(cookie.contains("HttpOnly"));
        let logs = h.state.repos.activity.for_day(Utc::now().date_naive()).await.expect("logs");
        assert_eq!(logs[0].activity_type, ActivityType::DashboardLogin);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_without_cookie() {
        let h = harness();

        let reply = send(
            &h.app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "root", "password": "wrong" })),
        )
        .await;

        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body, json!({ "success": false, "error": INVALID_CREDENTIALS_MESSAGE }));
        assert!(reply.set_cookie.is_none());
    }

    #[tokio::test]
    async fn logout_removes_cookie() {
        let h = harness();

        let reply =
            send(&h.app, Method::POST, "/api/auth/logout", Some("club_session=abc"), None).await;

        assert_eq!(reply.status, StatusCode::OK);
        let cookie = reply.set_cookie.expect("removal cookie");
        assert!(cookie.starts_with("club_session="));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn protected_routes_require_cookie() {
        let h = harness();

        let anonymous = send(&h.app, Method::GET, "/api/members", None, None).await;
        let with_cookie =
            send(&h.app, Method::GET, "/api/members", Some("club_session=anything"), None).await;

        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
        assert_eq!(anonymous.body["success"], false);
        assert_eq!(with_cookie.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn verified_sessions_reject_unknown_and_revoked_tokens() {
        let mut config = AppConfig::default();
        config.dashboard.verify_sessions = true;
        let h = harness_with(config, InMemorySlackApi::new());

        let forged =
            send(&h.app, Method::GET, "/api/members", Some("club_session=forged"), None).await;
        assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

        let login = send(
            &h.app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "root", "password": "root" })),
        )
        .await;
        let cookie = session_pair(&login.set_cookie.expect("cookie"));

        let allowed = send(&h.app, Method::GET, "/api/members", Some(&cookie), None).await;
        assert_eq!(allowed.status, StatusCode::OK);

        send(&h.app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
        let revoked = send(&h.app, Method::GET, "/api/members", Some(&cookie), None).await;
        assert_eq!(revoked.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unverified_login_does_not_store_a_session() {
        let h = harness();

        let login = send(
            &h.app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "root", "password": "root" })),
        )
        .await;
        let cookie = session_pair(&login.set_cookie.expect("cookie"));
        let token = cookie.trim_start_matches("club_session=");

        assert!(h.state.repos.sessions.find(token).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn verified_login_deletes_expired_sessions_of_the_user() {
        let mut config = AppConfig::default();
        config.dashboard.verify_sessions = true;
        let h = harness_with(config, InMemorySlackApi::new());
        let stale = Session::issue("root", Duration::hours(1), Utc::now() - Duration::days(2));
        h.state.repos.sessions.create(&stale).await.expect("seed stale session");

        let login = send(
            &h.app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "root", "password": "root" })),
        )
        .await;
        assert_eq!(login.status, StatusCode::OK);
        let cookie = session_pair(&login.set_cookie.expect("cookie"));
        let token = cookie.trim_start_matches("club_session=");

        assert!(h.state.repos.sessions.find(&stale.token).await.expect("find").is_none());
        assert!(h.state.repos.sessions.find(token).await.expect("find").is_some());
    }

    #[tokio::test]
    async fn channels_are_sorted_by_name_across_pages() {
        let slack = InMemorySlackApi::new().with_channel_pages(vec![
            vec![
                SlackChannel { id: "C3".into(), name: "study".into() },
                SlackChannel { id: "C1".into(), name: "announcements".into() },
            ],
            vec![SlackChannel { id: "C2".into(), name: "general".into() }],
        ]);
        let h = harness_with(AppConfig::default(), slack);

        let reply =
            send(&h.app, Method::GET, "/api/slack/channels", Some("club_session=x"), None).await;

        assert_eq!(reply.status, StatusCode::OK);
        let names: Vec<_> =
            reply.body.as_array().expect("array").iter().map(|c| c["name"].clone()).collect();
        assert_eq!(names, vec![json!("announcements"), json!("general"), json!("study")]);
    }

    #[tokio::test]
    async fn suggestions_can_be_filtered_and_transitioned() {
        let h = harness();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("time");
        let suggestion = Suggestion::submit(SuggestionCategory::Event, "MT 장소", "가평 추천", now)
            .expect("submit");
        h.state.repos.suggestions.save(&suggestion).await.expect("save");
        let uri = format!("/api/suggestions/{}", suggestion.id.0);

        let updated = send(
            &h.app,
            Method::PATCH,
            &uri,
            Some("club_session=x"),
            Some(json!({ "status": "resolved", "adminNote": "가평으로 확정" })),
        )
        .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["status"], "resolved");
        assert_eq!(updated.body["adminNote"], "가평으로 확정");

        let cookie = Some("club_session=x");
        let resolved =
            send(&h.app, Method::GET, "/api/suggestions?status=resolved", cookie, None).await;
        let pending =
            send(&h.app, Method::GET, "/api/suggestions?status=pending", cookie, None).await;
        assert_eq!(resolved.body.as_array().expect("array").len(), 1);
        assert!(pending.body.as_array().expect("array").is_empty());

        let reopened = send(
            &h.app,
            Method::PATCH,
            &uri,
            Some("club_session=x"),
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(reopened.status, StatusCode::BAD_REQUEST);

        let missing = send(
            &h.app,
            Method::PATCH,
            "/api/suggestions/sug_missing",
            Some("club_session=x"),
            Some(json!({ "status": "resolved" })),
        )
        .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let bad_filter = send(
            &h.app,
            Method::GET,
            "/api/suggestions?status=done",
            Some("club_session=x"),
            None,
        )
        .await;
        assert_eq!(bad_filter.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn warning_a_member_sends_dm_and_logs() {
        let h = harness();
        let now = Utc::now();
        let member = Member::joined(MemberId("U7".into()), "minsu", "김민수", now);
        h.state.repos.members.save(&member).await.expect("save");

        let reply =
            send(&h.app, Method::POST, "/api/members/U7/warn", Some("club_session=x"), None).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["success"], true);
        assert!(reply.body["message"].as_str().expect("message").contains("minsu"));
        assert_eq!(h.slack.posted_messages().await.len(), 1);
        let stored =
            h.state.repos.members.find_by_id(&member.id).await.expect("find").expect("present");
        assert_eq!(stored.warning_count, 1);
        let logs = h.state.repos.activity.for_target("U7", 5).await.expect("logs");
        assert_eq!(logs[0].activity_type, ActivityType::NameWarningSent);

        let missing = send(
            &h.app,
            Method::POST,
            "/api/members/U404/warn",
            Some("club_session=x"),
            None,
        )
        .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn activity_rejects_malformed_dates() {
        let h = harness();

        let reply =
            send(&h.app, Method::GET, "/api/activity?date=03-01-2026", Some("club_session=x"), None)
                .await;
        let ok =
            send(&h.app, Method::GET, "/api/activity?date=2026-03-01", Some("club_session=x"), None)
                .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body, json!([]));
    }
}
