//! Organization role and membership rows.

use cflows_core::membership::{normalize_permissions, Membership, Role};
use cflows_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A role row from the `organization_roles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrganizationRole {
    pub id: DbId,
    pub organization_id: DbId,
    pub name: String,
    pub permissions: Json<Vec<String>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OrganizationRole {
    pub fn to_role(&self) -> Role {
        Role {
            name: self.name.clone(),
            permissions: normalize_permissions(self.permissions.iter()),
        }
    }
}

/// A membership row from the `organization_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrganizationMember {
    pub id: DbId,
    pub organization_id: DbId,
    pub account_id: DbId,
    /// `None` once the member's role has been removed.
    pub role_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OrganizationMember {
    pub fn to_membership(&self) -> Membership {
        Membership {
            organization_id: self.organization_id,
            member_id: self.account_id,
            role_name: self.role_name.clone(),
        }
    }
}
