use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Organizer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Organizer => "organizer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    // Roles arrive in mixed case from token issuers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "organizer" => Ok(Role::Organizer),
            other => Err(CoreError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

/// An authenticated caller, resolved by the auth layer before any
/// commerce operation runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Buyer {
    pub id: String,
    pub role: Role,
}

impl Buyer {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, Role::User)
    }

    pub fn organizer(id: impl Into<String>) -> Self {
        Self::new(id, Role::Organizer)
    }

    pub fn require_role(&self, role: Role) -> CoreResult<()> {
        if self.role != role {
            return Err(CoreError::Unauthorized(format!(
                "this action requires the {} role",
                role
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("ORGANIZER".parse::<Role>().unwrap(), Role::Organizer);
        assert_eq!(" user ".parse::<Role>().unwrap(), Role::User);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_require_role() {
        let buyer = Buyer::user("u-1");
        assert!(buyer.require_role(Role::User).is_ok());
        assert!(matches!(
            buyer.require_role(Role::Organizer),
            Err(CoreError::Unauthorized(_))
        ));
    }
}
