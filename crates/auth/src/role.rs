use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access-level classification of an identity.
///
/// Exactly one role is stored per identity in the profile store. `Admin` is
/// selectable at sign-up but owns no protected area; for access checks it
/// sits in the `User` tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Coach,
    Moderator,
    Admin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Coach, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Coach => "coach",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored role tag, falling back to `User` for anything unknown.
    ///
    /// Use this for tags read back from the profile store; use `FromStr` for
    /// input that must be rejected when malformed.
    pub fn from_tag_lossy(tag: &str) -> Role {
        tag.parse().unwrap_or_else(|e: UnknownRole| {
            tracing::debug!(error = %e, "unrecognized stored role; using default");
            Role::default()
        })
    }

    /// The role whose protected area this role may enter.
    pub fn access_tier(self) -> Role {
        match self {
            Role::Admin => Role::User,
            other => other,
        }
    }

    /// Whether this role may enter an area guarded for `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.access_tier() == required.access_tier()
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "coach" => Ok(Role::Coach),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tags_round_trip_through_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn parsing_ignores_case_and_padding() {
        assert_eq!(" Coach ".parse::<Role>().unwrap(), Role::Coach);
        assert_eq!("MODERATOR".parse::<Role>().unwrap(), Role::Moderator);
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
        let role: Role = serde_json::from_str("\"coach\"").unwrap();
        assert_eq!(role, Role::Coach);
    }

    #[test]
    fn admin_is_in_the_user_tier() {
        assert!(Role::Admin.satisfies(Role::User));
        assert!(!Role::Admin.satisfies(Role::Coach));
        assert!(!Role::User.satisfies(Role::Moderator));
        assert!(Role::Coach.satisfies(Role::Coach));
    }

    proptest! {
        #[test]
        fn lossy_parse_never_escalates(tag in "\\PC*") {
            let role = Role::from_tag_lossy(&tag);
            if tag.parse::<Role>().is_err() {
                prop_assert_eq!(role, Role::User);
            }
        }
    }
}
