use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use clubbot_core::errors::DomainError;
use clubbot_core::ids::generate_uuid;
use clubbot_db::{Repositories, RepositoryError};

use crate::api::{SlackApi, SlackApiError};
use crate::blocks::MessageTemplate;

/// Everything a handler may touch, built fresh for each envelope.
#[derive(Clone)]
pub struct HandlerContext {
    pub correlation_id: String,
    pub now: DateTime<Utc>,
    pub repos: Repositories,
    pub slack: Arc<dyn SlackApi>,
}

impl HandlerContext {
    pub fn new(repos: Repositories, slack: Arc<dyn SlackApi>) -> Self {
        Self { correlation_id: generate_uuid(), now: Utc::now(), repos, slack }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// A message to return synchronously to the requester.
    Responded(MessageTemplate),
    Processed,
    Ignored,
    /// Per-block validation messages for a modal submission.
    ViewErrors(BTreeMap<String, String>),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    SlackApi(#[from] SlackApiError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
