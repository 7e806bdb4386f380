//! Owner-scoped access rules.
//!
//! Checked in order:
//! 1. Own data → ACCESS
//! 2. Administrator → ACCESS to any owner's data
//! 3. Default → DENY
//!
//! Identity issuance is external: callers hand us an already-authenticated
//! `CurrentUser`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::enums::Role;
use crate::models::Record;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    pub fn patient(id: Uuid) -> Self {
        Self { id, role: Role::Patient }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("User {user_id} may not act on data owned by {owner_id}")]
    Forbidden { user_id: Uuid, owner_id: Uuid },
}

/// Whether `user` may read or modify data belonging to `owner_id`.
pub fn can_access_owner(user: &CurrentUser, owner_id: &Uuid) -> bool {
    user.id == *owner_id || user.is_admin()
}

/// Whether `user` may re-analyze or delete `record`.
pub fn can_access_record(user: &CurrentUser, record: &Record) -> bool {
    can_access_owner(user, &record.owner_id)
}

/// Owner the caller is acting for. Without an explicit target the caller acts
/// for themselves; naming someone else requires the admin role.
pub fn resolve_owner(
    user: &CurrentUser,
    requested: Option<Uuid>,
) -> Result<Uuid, AuthorizationError> {
    let owner_id = requested.unwrap_or(user.id);
    if can_access_owner(user, &owner_id) {
        Ok(owner_id)
    } else {
        tracing::warn!(user_id = %user.id, owner_id = %owner_id, "Access denied");
        Err(AuthorizationError::Forbidden {
            user_id: user.id,
            owner_id,
        })
    }
}
