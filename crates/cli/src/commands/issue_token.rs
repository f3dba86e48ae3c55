use chrono::Duration;
use citequotes_db::repositories::{SqlUserRepository, UserRepository};

use crate::commands::{open_database, prepare, CommandResult, Failure};

const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

pub fn run(email: &str, name: Option<&str>, ttl_hours: Option<u64>) -> CommandResult {
    let (config, runtime) = match prepare("issue-token") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let hours = ttl_hours.unwrap_or(config.auth.token_ttl_hours);
    if hours == 0 {
        return CommandResult::failure(
            "issue-token",
            "invalid_input",
            "--ttl-hours must be at least 1",
            7,
        );
    }
    let ttl = Duration::hours(hours.min(MAX_TTL_HOURS) as i64);

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let users = SqlUserRepository::new(pool.clone());
        let user = users
            .ensure(email, name)
            .await
            .map_err(|error| ("invalid_input", error.to_string(), 7u8))?;
        let issued = users
            .issue_token(&user.id, ttl, Some("cli"))
            .await
            .map_err(|error| ("token_issue", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, Failure>((user, issued))
    });

    match result {
        Ok((user, issued)) => CommandResult::success(
            "issue-token",
            format!(
                "token for {} ({}) expires {}: {}",
                user.email,
                user.id.0,
                issued.expires_at.to_rfc3339(),
                issued.token
            ),
        ),
        Err(failure) => CommandResult::from_failure("issue-token", failure),
    }
}
