//! Repository for the `accounts` table.

use cflows_core::organization::normalize_email;
use cflows_core::types::DbId;
use sqlx::PgPool;
use validator::Validate;

use crate::error::{classify_unique_violation, DbResult};
use crate::models::account::{Account, CreateAccount};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, email, first_name, last_name, is_active, is_staff, created_at, updated_at";

/// Provides CRUD operations for accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Insert a new account. The email is stored lower-cased.
    pub async fn create(pool: &PgPool, input: &CreateAccount) -> DbResult<Account> {
        input.validate()?;
        let email = normalize_email(&input.email);

        let query = format!(
            "INSERT INTO accounts (email, first_name, last_name, is_staff)
             VALUES ($1, COALESCE($2, ''), COALESCE($3, ''), COALESCE($4, false))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(&email)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.is_staff)
            .fetch_one(pool)
            .await
            .map_err(|e| classify_unique_violation(e, "account", &email))
    }

    /// Find an account by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an account by email, ignoring case.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// List the members of an organization ordered by email.
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: DbId,
    ) -> Result<Vec<Account>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM accounts a
             JOIN organization_members m ON m.account_id = a.id
             WHERE m.organization_id = $1
             ORDER BY a.email ASC",
            prefixed("a")
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(organization_id)
            .fetch_all(pool)
            .await
    }
}

fn prefixed(alias: &str) -> String {
    COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
