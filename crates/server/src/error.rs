use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use clubbot_core::errors::{ApplicationError, InterfaceError};
use clubbot_db::RepositoryError;
use clubbot_slack::HandlerError;

/// `{success, data|error}` body shared by the webhook and dashboard APIs.
#[derive(Clone, Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, message: None }
    }
}

impl ApiResponse<()> {
    pub fn done() -> Self {
        Self { success: true, data: None, error: None, message: None }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, error: None, message: Some(message.into()) }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()), message: None }
    }
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn unauthorized(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::Unauthorized {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn not_found(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::NotFound {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn internal(detail: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::Internal {
            message: detail.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn from_repository(error: RepositoryError, correlation_id: &str) -> Self {
        Self::from_application(repository_failure(error), correlation_id)
    }

    pub fn from_handler(error: HandlerError, correlation_id: &str) -> Self {
        Self::from_application(handler_failure(error), correlation_id)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub fn repository_failure(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::NotFound { entity_type, key } => {
            ApplicationError::NotFound(format!("{entity_type} {key} not found"))
        }
        other => ApplicationError::Persistence(other.to_string()),
    }
}

pub fn handler_failure(error: HandlerError) -> ApplicationError {
    match error {
        HandlerError::Repository(error) => repository_failure(error),
        HandlerError::SlackApi(error) => ApplicationError::Integration(error.to_string()),
        HandlerError::Domain(error) => ApplicationError::Domain(error),
        HandlerError::InvalidPayload(message) => ApplicationError::Validation(message),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let InterfaceError::Internal { message, correlation_id } = &self.0 {
            error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                error = %message,
                "request failed"
            );
        }
        (status, Json(ApiResponse::failure(self.0.user_message()))).into_response()
    }
}
