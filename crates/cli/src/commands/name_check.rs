use chrono::Utc;
use clubbot_core::config::{AppConfig, LoadOptions};
use clubbot_core::name_check::NameCheckPolicy;
use clubbot_db::{connection::connect_with_config, migrations, Repositories, SingleTable};
use clubbot_server::scheduler::{handle_scheduled_event, ScheduledEvent};
use clubbot_slack::HttpSlackApi;
use serde_json::json;

use crate::commands::CommandResult;

const COMMAND: &str = "name-check";

type Failure = (&'static str, String, u8);

pub fn run(dry_run: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(execute(&config, dry_run)) {
        Ok(result) => result,
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}

async fn execute(config: &AppConfig, dry_run: bool) -> Result<CommandResult, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5))?;

    let repos = Repositories::new(SingleTable::sql(pool.clone()));
    let policy = NameCheckPolicy::from_secs(config.scheduler.warning_cooldown_secs);
    let now = Utc::now();

    let outcome = if dry_run {
        let members =
            repos.members.list().await.map_err(|error| ("repository", error.to_string(), 7))?;
        let plan = policy.plan(&members, now);
        let candidates: Vec<_> = plan
            .to_warn
            .iter()
            .map(|member| json!({ "id": member.id.0, "displayName": member.display_name }))
            .collect();
        CommandResult::success_with_details(
            COMMAND,
            format!("{} member(s) would be warned", candidates.len()),
            json!({
                "scanned": members.len(),
                "skippedCooldown": plan.skipped_cooldown,
                "valid": plan.valid,
                "candidates": candidates,
            }),
        )
    } else {
        let slack = HttpSlackApi::new(&config.slack)
            .map_err(|error| ("slack_client", error.to_string(), 6))?;
        let event = ScheduledEvent::name_check(now);
        let report = handle_scheduled_event(&slack, &repos, policy, &event)
            .await
            .map_err(|error| ("name_check", error.to_string(), 7))?;
        let details =
            serde_json::to_value(&report).map_err(|error| ("serialization", error.to_string(), 7))?;
        CommandResult::success_with_details(
            COMMAND,
            format!("warned {} of {} member(s)", report.warned, report.scanned),
            details,
        )
    };

    pool.close().await;
    Ok(outcome)
}
