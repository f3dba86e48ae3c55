use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Privilege levels, ordered from least to most privileged.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    #[default]
    User,
    Moderator,
    Admin,
    SuperAdmin,
}

impl Privilege {
    pub const ALL: [Privilege; 4] =
        [Privilege::User, Privilege::Moderator, Privilege::Admin, Privilege::SuperAdmin];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "user" => Some(Self::User),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            "super_admin" | "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn at_least(self, min: Privilege) -> bool {
        self >= min
    }

    pub fn require(self, min: Privilege) -> Result<(), DomainError> {
        if self.at_least(min) {
            Ok(())
        } else {
            Err(DomainError::InsufficientPrivilege { required: min, actual: self })
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub email: String,
    pub role: Privilege,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Decides whether `actor` may move `target` from `current` to `requested`.
///
/// Admins manage users strictly below them. Super admins may assign any role,
/// including to other super admins. Nobody changes their own role.
pub fn check_role_change(
    actor: &UserId,
    actor_role: Privilege,
    target: &UserId,
    current: Privilege,
    requested: Privilege,
) -> Result<(), DomainError> {
    actor_role.require(Privilege::Admin)?;

    if actor == target {
        return Err(DomainError::validation("users cannot change their own role"));
    }

    if actor_role == Privilege::SuperAdmin {
        return Ok(());
    }

    if current >= actor_role || requested >= actor_role {
        return Err(DomainError::InsufficientPrivilege {
            required: Privilege::SuperAdmin,
            actual: actor_role,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_role_change, Privilege, UserId};
    use crate::errors::DomainError;

    fn id(raw: &str) -> UserId {
        UserId(raw.to_string())
    }

    #[test]
    fn privileges_are_ordered() {
        assert!(Privilege::SuperAdmin > Privilege::Admin);
        assert!(Privilege::Admin > Privilege::Moderator);
        assert!(Privilege::Moderator > Privilege::User);
        assert!(Privilege::Admin.at_least(Privilege::Moderator));
        assert!(!Privilege::User.at_least(Privilege::Moderator));
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(Privilege::parse("super-admin"), Some(Privilege::SuperAdmin));
        assert_eq!(Privilege::parse(" Admin "), Some(Privilege::Admin));
        assert_eq!(Privilege::parse("owner"), None);
        for privilege in Privilege::ALL {
            assert_eq!(Privilege::parse(privilege.as_str()), Some(privilege));
        }
    }

    #[test]
    fn admin_can_promote_user_to_moderator() {
        check_role_change(
            &id("admin-1"),
            Privilege::Admin,
            &id("user-1"),
            Privilege::User,
            Privilege::Moderator,
        )
        .expect("admin may promote below own level");
    }

    #[test]
    fn admin_cannot_grant_admin_or_touch_peers() {
        let grant = check_role_change(
            &id("admin-1"),
            Privilege::Admin,
            &id("user-1"),
            Privilege::User,
            Privilege::Admin,
        );
        assert!(matches!(grant, Err(DomainError::InsufficientPrivilege { .. })));

        let demote_peer = check_role_change(
            &id("admin-1"),
            Privilege::Admin,
            &id("admin-2"),
            Privilege::Admin,
            Privilege::User,
        );
        assert!(matches!(demote_peer, Err(DomainError::InsufficientPrivilege { .. })));
    }

    #[test]
    fn moderators_cannot_manage_roles() {
        let result = check_role_change(
            &id("mod-1"),
            Privilege::Moderator,
            &id("user-1"),
            Privilege::User,
            Privilege::User,
        );
        assert!(matches!(result, Err(DomainError::InsufficientPrivilege { .. })));
    }

    #[test]
    fn nobody_changes_their_own_role() {
        let result = check_role_change(
            &id("root"),
            Privilege::SuperAdmin,
            &id("root"),
            Privilege::SuperAdmin,
            Privilege::User,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn super_admin_can_assign_any_role() {
        check_role_change(
            &id("root"),
            Privilege::SuperAdmin,
            &id("admin-1"),
            Privilege::Admin,
            Privilege::SuperAdmin,
        )
        .expect("super admin is unrestricted");
    }
}
