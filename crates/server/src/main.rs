use std::time::Duration;

use anyhow::Result;
use clubbot_core::config::{AppConfig, LoadOptions};
use clubbot_server::scheduler::NameCheckScheduler;
use clubbot_server::{app_router, bootstrap_with_config, init_logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config.logging);

    let app = bootstrap_with_config(config).await?;
    let config = app.state.config.clone();

    let scheduler = config.scheduler.enabled.then(|| NameCheckScheduler::spawn(app.state.clone()));

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        scheduler_enabled = config.scheduler.enabled,
        "clubbot-server listening"
    );

    axum::serve(listener, app_router(app.state.clone(), app.db_pool.clone()))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "clubbot-server stopping"
    );
    if let Some(scheduler) = scheduler {
        let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
        if tokio::time::timeout(grace, scheduler.shutdown()).await.is_err() {
            warn!(
                event_name = "system.server.scheduler_timeout",
                correlation_id = "shutdown",
                "scheduler did not stop within the grace period"
            );
        }
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_failed",
            error = %error,
            "could not listen for ctrl-c"
        );
        std::future::pending::<()>().await;
    }
}
