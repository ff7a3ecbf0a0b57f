//! Repository for the `organizations` table.

use cflows_core::organization::{resolve_slug, validate_organization_name, validate_slug};
use cflows_core::types::DbId;
use sqlx::PgPool;
use validator::Validate;

use crate::error::{classify_unique_violation, DbResult};
use crate::models::organization::{CreateOrganization, Organization, UpdateOrganization};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, slug, is_active, owner_id, created_at, updated_at";

/// Provides CRUD operations for organizations.
pub struct OrganizationRepo;

impl OrganizationRepo {
    /// Insert a new organization, returning the created row.
    ///
    /// The slug is derived from the name when omitted. Name (case-insensitive)
    /// and slug collisions fail with `DuplicateName`.
    pub async fn create(pool: &PgPool, input: &CreateOrganization) -> DbResult<Organization> {
        input.validate()?;
        let name = input.name.trim();
        validate_organization_name(name)?;
        let slug = resolve_slug(name, input.slug.as_deref())?;

        let query = format!(
            "INSERT INTO organizations (name, slug, owner_id)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        let organization = sqlx::query_as::<_, Organization>(&query)
            .bind(name)
            .bind(&slug)
            .bind(input.owner_id)
            .fetch_one(pool)
            .await
            .map_err(|e| classify_unique_violation(e, "organization", name))?;

        tracing::info!(organization_id = organization.id, slug = %organization.slug, "Organization created");
        Ok(organization)
    }

    /// Find an organization by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Organization>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM organizations WHERE id = $1");
        sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an organization by its URL slug.
    pub async fn find_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM organizations WHERE slug = $1");
        sqlx::query_as::<_, Organization>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Whether an organization with this name exists, ignoring case.
    pub async fn name_taken(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM organizations WHERE LOWER(name) = LOWER($1))")
                .bind(name.trim())
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    /// List organizations by name. Inactive ones only when asked for.
    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Organization>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM organizations
             WHERE is_active OR $1
             ORDER BY name ASC"
        );
        sqlx::query_as::<_, Organization>(&query)
            .bind(include_inactive)
            .fetch_all(pool)
            .await
    }

    /// Update an organization. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateOrganization,
    ) -> DbResult<Option<Organization>> {
        input.validate()?;
        let name = input.name.as_deref().map(str::trim);
        if let Some(name) = name {
            validate_organization_name(name)?;
        }
        let slug = input.slug.as_deref().map(str::trim);
        if let Some(slug) = slug {
            validate_slug(slug)?;
        }

        let query = format!(
            "UPDATE organizations SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                owner_id = COALESCE($4, owner_id)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let label = name.or(slug).unwrap_or_default().to_string();
        let organization = sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .bind(name)
            .bind(slug)
            .bind(input.owner_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| classify_unique_violation(e, "organization", &label))?;
        Ok(organization)
    }

    /// Activate or deactivate an organization. Returns `true` if a row changed.
    pub async fn set_active(pool: &PgPool, id: DbId, is_active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE organizations SET is_active = $2 WHERE id = $1 AND is_active <> $2",
        )
        .bind(id)
        .bind(is_active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently delete an organization and, by cascade, its station
    /// configurations, cars, roles and memberships.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() > 0 {
            tracing::info!(organization_id = id, "Organization deleted");
        }
        Ok(result.rows_affected() > 0)
    }
}
