use std::sync::Arc;

use clubbot_core::config::AppConfig;
use clubbot_core::name_check::NameCheckPolicy;
use clubbot_db::Repositories;
use clubbot_slack::{HandlerContext, SignatureVerifier, SlackApi, SlackDispatcher};

/// Handles shared by every request; each request builds its own `HandlerContext` from them.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repos: Repositories,
    pub slack: Arc<dyn SlackApi>,
    pub dispatcher: Arc<SlackDispatcher>,
    pub verifier: Option<Arc<SignatureVerifier>>,
}

impl AppState {
    pub fn new(config: AppConfig, repos: Repositories, slack: Arc<dyn SlackApi>) -> Self {
        let verifier = config
            .slack
            .signing_secret
            .clone()
            .map(|secret| Arc::new(SignatureVerifier::new(secret)));
        Self {
            config: Arc::new(config),
            repos,
            slack,
            dispatcher: Arc::new(SlackDispatcher::default()),
            verifier,
        }
    }

    pub fn handler_context(&self) -> HandlerContext {
        HandlerContext::new(self.repos.clone(), self.slack.clone())
    }

    pub fn name_check_policy(&self) -> NameCheckPolicy {
        NameCheckPolicy::from_secs(self.config.scheduler.warning_cooldown_secs)
    }
}
