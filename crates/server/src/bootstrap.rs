use std::sync::Arc;

use clubbot_core::config::{AppConfig, ConfigError, LoadOptions};
use clubbot_db::{connection::connect_with_config, migrations, DbPool, Repositories, SingleTable};
use clubbot_slack::{HttpSlackApi, SlackApiError};
use thiserror::Error;
use tracing::info;

use crate::state::AppState;

pub struct Application {
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] SlackApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let slack = HttpSlackApi::new(&config.slack).map_err(BootstrapError::SlackClient)?;
    let repos = Repositories::new(SingleTable::sql(db_pool.clone()));
    let state = AppState::new(config, repos, Arc::new(slack));

    Ok(Application { db_pool, state })
}
