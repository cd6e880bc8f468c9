//! Caller roles as asserted by the external authentication layer.

use serde::Serialize;

pub const ROLE_PROFESSOR: &str = "professor";
pub const ROLE_COORDINATOR: &str = "coordenador";

/// Alternate spelling accepted for the coordinator role.
const ROLE_COORDINATOR_EN: &str = "coordinator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Professor,
    Coordinator,
}

impl Role {
    /// Parse a role name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            ROLE_PROFESSOR => Some(Self::Professor),
            ROLE_COORDINATOR | ROLE_COORDINATOR_EN => Some(Self::Coordinator),
            _ => None,
        }
    }

    pub fn is_coordinator(self) -> bool {
        self == Self::Coordinator
    }
}
