use super::model::Rights;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed set of role names a Role may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Admin,
    Manager,
    Operator,
    Merchant,
    Support,
}

impl RoleName {
    pub const ALL: [Self; 5] = [
        Self::Admin,
        Self::Manager,
        Self::Operator,
        Self::Merchant,
        Self::Support,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Operator => "OPERATOR",
            Self::Merchant => "MERCHANT",
            Self::Support => "SUPPORT",
        }
    }
}

impl FromStr for RoleName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| Error::InvalidRole(value.to_string()))
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: RoleName,
    pub localized_name: String,
    pub notes: String,
    pub rights: Rights,
}

/// Caller-supplied fields for creating or editing a role, still unvalidated.
#[derive(Clone, Debug, Default)]
pub struct RoleInput {
    pub name: String,
    pub localized_name: String,
    pub notes: String,
    pub rights: super::RawRights,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_parse() {
        for name in RoleName::ALL {
            assert_eq!(name.as_str().parse::<RoleName>().ok(), Some(name));
        }
    }

    #[test]
    fn unknown_role_name_is_rejected() {
        let result = "ROOT".parse::<RoleName>();
        assert!(matches!(result, Err(Error::InvalidRole(name)) if name == "ROOT"));
    }
}
