//! User, role and session models.
//!
//! Sessions are written by the external authentication layer. This service
//! only reads them, resolving each bearer token once into typed [`Claims`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::AppError;

/// Closed set of roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    SystemAdmin,
    StoreOperator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::StoreOperator => "STORE_OPERATOR",
        }
    }

    /// Roles allowed to see analytics.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::SystemAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "SYSTEM_ADMIN" => Ok(Role::SystemAdmin),
            "STORE_OPERATOR" => Ok(Role::StoreOperator),
            other => Err(AppError::Internal(format!("unknown role {other:?}"))),
        }
    }
}

/// Raw `users` row; `role` is validated when converting to [`User`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub company_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// An authenticated principal, returned by `GET /api/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row.role.parse()?,
            id: row.id,
            email: row.email,
            name: row.name,
            company_id: row.company_id,
            store_id: row.store_id,
            created_at: row.created_at,
        })
    }
}

/// Raw `sessions` row as looked up by token hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub user_id: Uuid,
    pub role: String,
    pub company_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// Typed session payload attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
}

impl TryFrom<SessionRow> for Claims {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            role: row.role.parse()?,
            company_id: row.company_id,
            store_id: row.store_id,
        })
    }
}

impl Claims {
    /// Narrow a requested store filter to what this principal may see.
    ///
    /// Admins get what they asked for. Store operators are pinned to their
    /// own store and may not ask for another one.
    pub fn scope_store(&self, requested: Option<Uuid>) -> Result<Option<Uuid>, AppError> {
        if self.role.is_admin() {
            return Ok(requested);
        }
        let own = self.store_id.ok_or(AppError::Forbidden)?;
        match requested {
            Some(other) if other != own => Err(AppError::Forbidden),
            _ => Ok(Some(own)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
}
