use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{generate_id, require_text};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SupportExecutive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::SupportExecutive => "support_executive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "super_admin" => Some(Self::SuperAdmin),
            "support_executive" => Some(Self::SupportExecutive),
            _ => None,
        }
    }
}

/// The caller identity handed to the core by the session layer. The role is
/// never carried here; it is resolved from storage on every operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: UserId(user_id.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(
        user_id: UserId,
        full_name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let email = require_text("email", email)?;
        if !email.contains('@') {
            return Err(DomainError::InvalidInput(format!("`{email}` is not an email address")));
        }

        Ok(Self {
            id: ProfileId::generate(),
            user_id,
            full_name: require_text("full_name", full_name)?,
            email,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Collapses the role rows stored for one user into that user's role.
pub fn resolve_role(user_id: &UserId, rows: &[UserRole]) -> Result<Role, DomainError> {
    match rows {
        [] => Err(DomainError::RoleNotAssigned { user_id: user_id.0.clone() }),
        [row] => Ok(row.role),
        _ => Err(DomainError::DuplicateRoleAssignment {
            user_id: user_id.0.clone(),
            rows: rows.len(),
        }),
    }
}
