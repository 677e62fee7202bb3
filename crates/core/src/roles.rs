//! Portal roles.
//!
//! The string forms must match the `user_role` enum of the remote store.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_FACULTY: &str = "faculty";
pub const ROLE_STUDENT: &str = "student";

/// All valid role names.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_FACULTY, ROLE_STUDENT];

/// The single role carried by every identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Faculty,
    Student,
}

impl Role {
    /// Parse from the remote `role` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            ROLE_ADMIN => Ok(Self::Admin),
            ROLE_FACULTY => Ok(Self::Faculty),
            ROLE_STUDENT => Ok(Self::Student),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {VALID_ROLES:?}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => ROLE_ADMIN,
            Self::Faculty => ROLE_FACULTY,
            Self::Student => ROLE_STUDENT,
        }
    }

    /// Badge label shown next to the signed-in user's name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::Faculty => "Faculty",
            Self::Student => "Student",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
