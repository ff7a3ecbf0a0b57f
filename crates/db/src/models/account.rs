//! Account entity model and DTOs.

use cflows_core::context::Actor;
use cflows_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// An account row from the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: DbId,
    /// Always stored lower-case.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// This account as the actor of a request.
    pub fn actor(&self) -> Actor {
        Actor::Account {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

/// DTO for creating a new account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccount {
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    /// Defaults to `false` if omitted.
    pub is_staff: Option<bool>,
}
