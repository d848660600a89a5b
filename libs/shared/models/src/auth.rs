use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller identity as handed over by the identity collaborator.
///
/// The scheduling core never authenticates; it trusts this value and uses it
/// for salon scoping, audit stamps and override permission checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub role: Role,
    pub salon_id: Uuid,
}

impl RequestContext {
    pub fn new(user_id: Uuid, role: Role, salon_id: Uuid) -> Self {
        Self { user_id, role, salon_id }
    }

    /// Whether this caller may see records belonging to `salon_id`.
    pub fn can_access_salon(&self, salon_id: Uuid) -> bool {
        self.role == Role::SuperAdmin || self.salon_id == salon_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SalonOwner,
    SalonManager,
    LocationManager,
    Staff,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::SuperAdmin => write!(f, "super_admin"),
            Role::SalonOwner => write!(f, "salon_owner"),
            Role::SalonManager => write!(f, "salon_manager"),
            Role::LocationManager => write!(f, "location_manager"),
            Role::Staff => write!(f, "staff"),
            Role::Customer => write!(f, "customer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "super_admin" => Ok(Role::SuperAdmin),
            "salon_owner" => Ok(Role::SalonOwner),
            "salon_manager" => Ok(Role::SalonManager),
            "location_manager" => Ok(Role::LocationManager),
            "staff" => Ok(Role::Staff),
            "customer" => Ok(Role::Customer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
