use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};

use clubbot_core::domain::activity::{ActivityLog, ActivityType};
use clubbot_core::domain::member::{Member, MemberId};
use clubbot_core::domain::suggestion::{Suggestion, SuggestionCategory, SuggestionStatus};
use clubbot_db::{connect_with_settings, migrations, Repositories, RepositoryError, SingleTable};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

async fn open_table(url: &str) -> ContractResult<SingleTable> {
    let pool = connect_with_settings(url, 1, 30).await.map_err(|error| error.to_string())?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;
    Ok(SingleTable::sql(pool))
}

#[tokio::test]
async fn records_survive_reconnect_to_the_same_database_file() -> ContractResult {
    let dir = tempfile::tempdir().map_err(|error| error.to_string())?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("club.db").display());
    let joined = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().ok_or("time")?;

    {
        let repos = Repositories::new(open_table(&url).await?);
        let member = Member::joined(MemberId("U1".into()), "홍길동/23", "Hong", joined);
        repos.members.save(&member).await.map_err(|error| error.to_string())?;
    }

    let repos = Repositories::new(open_table(&url).await?);
    let found = repos
        .members
        .find_by_id(&MemberId("U1".into()))
        .await
        .map_err(|error| error.to_string())?;
    require!(
        found.as_ref().map(|member| member.display_name.as_str()) == Some("홍길동/23"),
        "member should be readable after reconnect, got {found:?}"
    );
    Ok(())
}

#[tokio::test]
async fn sqlite_facade_supports_every_access_pattern() -> ContractResult {
    let table = open_table("sqlite::memory:").await?;
    let repos = Repositories::new(table.clone());
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().ok_or("time")?;

    let mut suggestion = Suggestion::submit(SuggestionCategory::Operation, "회비", "회비 공개", now)
        .map_err(|error| error.to_string())?;
    repos.suggestions.save(&suggestion).await.map_err(|error| error.to_string())?;
    suggestion
        .transition(SuggestionStatus::Resolved, None, now + Duration::hours(1))
        .map_err(|error| error.to_string())?;
    repos.suggestions.save(&suggestion).await.map_err(|error| error.to_string())?;

    let pending = repos
        .suggestions
        .list(Some(SuggestionStatus::Pending))
        .await
        .map_err(|error| error.to_string())?;
    let resolved = repos
        .suggestions
        .list(Some(SuggestionStatus::Resolved))
        .await
        .map_err(|error| error.to_string())?;
    require!(pending.is_empty(), "resolved suggestion must leave the pending listing");
    require!(resolved.len() == 1, "expected one resolved suggestion, got {}", resolved.len());

    let log = ActivityLog::record(
        ActivityType::SuggestionStatusChanged,
        "root",
        Some(suggestion.id.0.clone()),
        json!({ "to": "resolved" }),
        now + Duration::hours(1),
    );
    repos.activity.append(&log).await.map_err(|error| error.to_string())?;
    let day = repos.activity.for_day(now.date_naive()).await.map_err(|error| error.to_string())?;
    require!(day == vec![log.clone()], "activity log should be listed for its day");

    let mut patch = Map::new();
    patch.insert("realName".to_string(), Value::String("Nobody".to_string()));
    let missing = table.update::<Member>(&MemberId("U404".into()), patch).await;
    require!(
        matches!(missing, Err(RepositoryError::NotFound { .. })),
        "update of a missing member must be NotFound, got {missing:?}"
    );
    Ok(())
}
