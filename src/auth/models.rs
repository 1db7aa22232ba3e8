use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user within the institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Faculty,
    /// Course assistant.
    Ca,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "STUDENT"),
            Role::Faculty => write!(f, "FACULTY"),
            Role::Ca => write!(f, "CA"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl Role {
    /// Parse a role from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "STUDENT" => Some(Role::Student),
            "FACULTY" => Some(Role::Faculty),
            "CA" => Some(Role::Ca),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Roles that appear on a class's faculty roster.
    pub fn teaches(&self) -> bool {
        matches!(self, Role::Faculty | Role::Ca)
    }
}

/// The caller of a request, as identified by the upstream auth gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Identity-provider uid, matched against `User::uid`.
    pub uid: String,
}
