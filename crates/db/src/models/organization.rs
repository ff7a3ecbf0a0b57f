//! Organization entity model and DTOs.

use cflows_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// An organization row from the `organizations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: DbId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub owner_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new organization.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrganization {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Derived from `name` if omitted.
    pub slug: Option<String>,
    pub owner_id: Option<DbId>,
}

/// DTO for updating an existing organization. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOrganization {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub owner_id: Option<DbId>,
}
