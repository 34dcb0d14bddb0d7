//! Periodic name-format check.
//!
//! The timer emits a [`ScheduledEvent`] every `scheduler.name_check_interval_secs`
//! and runs the job to completion before awaiting the next tick, so firings never
//! overlap. Idempotency across firings comes from the warning cooldown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use clubbot_core::name_check::{NameCheckPolicy, NameCheckReport};
use clubbot_db::{Repositories, RepositoryError};
use clubbot_slack::warnings::send_name_warning;
use clubbot_slack::SlackApi;

use crate::state::AppState;

pub const SCHEDULER_SOURCE: &str = "scheduler";
pub const NAME_CHECK_ACTION: &str = "name-check";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub source: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl ScheduledEvent {
    pub fn name_check(timestamp: DateTime<Utc>) -> Self {
        Self {
            source: SCHEDULER_SOURCE.to_string(),
            action: NAME_CHECK_ACTION.to_string(),
            timestamp,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unsupported scheduled event `{source_name}/{action}`")]
    UnsupportedEvent { source_name: String, action: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Entry point for one firing.
pub async fn handle_scheduled_event(
    slack: &dyn SlackApi,
    repos: &Repositories,
    policy: NameCheckPolicy,
    event: &ScheduledEvent,
) -> Result<NameCheckReport, SchedulerError> {
    if event.source != SCHEDULER_SOURCE || event.action != NAME_CHECK_ACTION {
        return Err(SchedulerError::UnsupportedEvent {
            source_name: event.source.clone(),
            action: event.action.clone(),
        });
    }
    Ok(run_name_check(slack, repos, policy, event.timestamp).await?)
}

/// Warns every member whose display name is malformed and who is outside the cooldown.
///
/// A failed DM counts as `failed` and leaves the member eligible for the next run.
pub async fn run_name_check(
    slack: &dyn SlackApi,
    repos: &Repositories,
    policy: NameCheckPolicy,
    now: DateTime<Utc>,
) -> Result<NameCheckReport, RepositoryError> {
    let members = repos.members.list().await?;
    let plan = policy.plan(&members, now);

    let mut report = NameCheckReport {
        scanned: members.len(),
        skipped_cooldown: plan.skipped_cooldown,
        valid: plan.valid,
        ..NameCheckReport::default()
    };

    for member in plan.to_warn {
        match send_name_warning(slack, repos, member, SCHEDULER_SOURCE, now).await {
            Ok(_) => report.warned += 1,
            Err(error) => {
                warn!(
                    event_name = "scheduler.name_check.warning_failed",
                    member_id = %member.id.0,
                    error = %error,
                    "name warning failed"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        event_name = "scheduler.name_check.completed",
        scanned = report.scanned,
        warned = report.warned,
        skipped_cooldown = report.skipped_cooldown,
        valid = report.valid,
        failed = report.failed,
        "name check completed"
    );
    Ok(report)
}

pub struct NameCheckScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl NameCheckScheduler {
    /// Starts the timer; the first firing happens one full period after start.
    pub fn spawn(state: AppState) -> Self {
        let period = Duration::from_secs(state.config.scheduler.name_check_interval_secs.max(1));
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let slack: Arc<dyn SlackApi> = state.slack.clone();
        let policy = state.name_check_policy();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                event_name = "scheduler.started",
                period_secs = period.as_secs(),
                "name check scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let event = ScheduledEvent::name_check(Utc::now());
                        if let Err(error) = handle_scheduled_event(
                            slack.as_ref(),
                            &state.repos,
                            policy,
                            &event,
                        )
                        .await
                        {
                            error!(
                                event_name = "scheduler.name_check.failed",
                                error = %error,
                                "scheduled name check failed"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!(event_name = "scheduler.stopped", "name check scheduler stopped");
                        break;
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.handle.await {
            warn!(
                event_name = "scheduler.join_failed",
                error = %error,
                "scheduler task ended abnormally"
            );
        }
    }
}
