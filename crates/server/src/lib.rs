//! HTTP surface of the club bot: Slack ingress, payment webhooks, the admin
//! dashboard API, health, and the name-check scheduler.

pub mod bootstrap;
pub mod dashboard;
pub mod error;
pub mod health;
pub mod scheduler;
pub mod slack_ingress;
pub mod state;
pub mod webhooks;

use axum::Router;
use clubbot_core::config::{LogFormat, LoggingConfig};
use clubbot_db::DbPool;
use tower_http::trace::TraceLayer;
use tracing::Level;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use state::AppState;

pub fn app_router(state: AppState, db_pool: DbPool) -> Router {
    Router::new()
        .merge(health::router(db_pool))
        .merge(webhooks::router(state.clone()))
        .merge(dashboard::router(state.clone()))
        .merge(slack_ingress::router(state))
        .layer(TraceLayer::new_for_http())
}

/// Installs the global subscriber; later calls are no-ops.
pub fn init_logging(logging: &LoggingConfig) {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let _ = match logging.format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .compact()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .pretty()
            .try_init(),
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().try_init()
        }
    };
}
