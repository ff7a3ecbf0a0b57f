//! Car entity model and DTOs.

use cflows_core::types::{DbId, Timestamp};
use cflows_core::vehicle::CarMetadata;
use cflows_core::workflow::StationStateMap;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use validator::Validate;

/// A car row from the `cars` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Car {
    pub id: DbId,
    pub organization_id: DbId,
    pub make: String,
    pub model: String,
    /// Upper-case, unique across all organizations.
    pub registration_number: Option<String>,
    pub color: String,
    pub year: Option<i32>,
    pub mileage: Option<i32>,
    pub is_active: bool,
    pub is_archived: bool,
    pub deleted_at: Option<Timestamp>,
    pub station_state: Json<StationStateMap>,
    pub metadata: Json<CarMetadata>,
    pub tags: Json<Vec<String>>,
    pub notes: Json<Vec<String>>,
    pub messages: Json<Vec<String>>,
    pub custom_info: Json<Vec<String>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Car {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Display label: `make model (REG)`.
    pub fn label(&self) -> String {
        let reg = self.registration_number.as_deref().unwrap_or("-");
        format!("{} {} ({reg})", self.make, self.model)
    }
}

/// DTO for creating a car. The station state is seeded, never supplied.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateCar {
    #[validate(length(max = 100))]
    pub make: String,
    #[validate(length(max = 100))]
    pub model: String,
    pub registration_number: Option<String>,
    /// Defaults to `"Not specified"` if omitted.
    #[validate(length(max = 50))]
    pub color: Option<String>,
    pub year: Option<i32>,
    pub mileage: Option<i32>,
    pub metadata: Option<CarMetadata>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<Vec<String>>,
    pub messages: Option<Vec<String>>,
    pub custom_info: Option<Vec<String>>,
}

/// DTO for updating a car's descriptive fields. All fields are optional.
///
/// Station state changes go through `StationWorkflowRepo`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCar {
    #[validate(length(max = 100))]
    pub make: Option<String>,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    /// Blank clears the registration number.
    pub registration_number: Option<String>,
    #[validate(length(max = 50))]
    pub color: Option<String>,
    pub year: Option<i32>,
    pub mileage: Option<i32>,
    pub is_active: Option<bool>,
    pub metadata: Option<CarMetadata>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<Vec<String>>,
    pub messages: Option<Vec<String>>,
    pub custom_info: Option<Vec<String>>,
}

/// A status change requested by the presentation layer.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub car_id: DbId,
    pub station: String,
    pub status: String,
    /// Defaults to the current time if omitted.
    pub timestamp: Option<Timestamp>,
}

/// Integrity report for one car.
#[derive(Debug, Clone, Serialize)]
pub struct CarAudit {
    pub car_id: DbId,
    pub label: String,
    pub violations: Vec<cflows_core::workflow::StationViolation>,
}
