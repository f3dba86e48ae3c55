use citequotes_core::domain::role::Privilege;
use citequotes_db::repositories::{
    RoleRepository, SqlRoleRepository, SqlUserRepository, UserRepository,
};

use crate::commands::{open_database, prepare, CommandResult, Failure};

/// Operator escape hatch; the API's role-change rules are not applied here.
pub fn run(email: &str, role: &str) -> CommandResult {
    let Some(privilege) = Privilege::parse(role) else {
        let known: Vec<&str> = Privilege::ALL.iter().map(Privilege::as_str).collect();
        return CommandResult::failure(
            "grant-role",
            "invalid_input",
            format!("unknown role `{role}`; expected one of {}", known.join(", ")),
            7,
        );
    };

    let (config, runtime) = match prepare("grant-role") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let user = SqlUserRepository::new(pool.clone())
            .ensure(email, None)
            .await
            .map_err(|error| ("invalid_input", error.to_string(), 7u8))?;
        let assigned = SqlRoleRepository::new(pool.clone())
            .set_role(&user.id, privilege, "cli")
            .await
            .map_err(|error| ("role_update", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, Failure>((user, assigned))
    });

    match result {
        Ok((user, assigned)) => CommandResult::success(
            "grant-role",
            format!("{} ({}) is now {}", user.email, user.id.0, assigned.role.as_str()),
        ),
        Err(failure) => CommandResult::from_failure("grant-role", failure),
    }
}
