//! Station configuration entity model and DTOs.

use cflows_core::station::StationDefinition;
use cflows_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use validator::Validate;

/// A row from the `station_configurations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StationConfiguration {
    pub id: DbId,
    pub organization_id: DbId,
    pub name: String,
    pub description: String,
    pub display_order: i32,
    pub is_active: bool,
    pub default_status: String,
    /// Ordered as entered by the admin.
    pub allowed_statuses: Json<Vec<String>>,
    pub required: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StationConfiguration {
    /// The workflow-relevant part of this configuration.
    pub fn definition(&self) -> StationDefinition {
        StationDefinition {
            name: self.name.clone(),
            display_order: self.display_order,
            is_active: self.is_active,
            default_status: self.default_status.clone(),
            allowed_statuses: self.allowed_statuses.0.clone(),
            required: self.required,
        }
    }
}

/// DTO for creating a station configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStationConfiguration {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `0` if omitted.
    #[validate(range(min = 0))]
    pub display_order: Option<i32>,
    /// Defaults to `"pending"` if omitted.
    pub default_status: Option<String>,
    pub allowed_statuses: Vec<String>,
    /// Defaults to `false` if omitted.
    pub required: Option<bool>,
}

/// DTO for updating a station configuration. All fields are optional.
///
/// Activation is changed through `StationConfigurationRepo::set_active`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStationConfiguration {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub display_order: Option<i32>,
    pub default_status: Option<String>,
    pub allowed_statuses: Option<Vec<String>>,
    pub required: Option<bool>,
}
