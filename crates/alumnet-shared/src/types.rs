use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::GUEST_DISPLAY_NAME;

/// A user id. Matches the backend's auth user id and the `profiles.id` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
    Faculty,
    Alumni,
    Guest,
}

impl Role {
    /// Roles that can be asked for mentorship.
    pub fn can_mentor(self) -> bool {
        matches!(self, Role::Alumni | Role::Faculty)
    }

    /// Roles allowed to publish campus events.
    pub fn can_host_events(self) -> bool {
        matches!(self, Role::Admin | Role::Faculty | Role::Alumni)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Alumni => "alumni",
            Role::Guest => "guest",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is using the application.
///
/// Identities are replaced wholesale when the session changes; nothing
/// mutates one in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl Identity {
    /// Synthesize a transient guest identity with a random id. It has no
    /// backend row.
    pub fn guest() -> Self {
        Self {
            id: UserId::new(),
            display_name: GUEST_DISPLAY_NAME.to_string(),
            role: Role::Guest,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.role == Role::Guest
    }
}
