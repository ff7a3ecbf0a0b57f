//! Repository for the `station_configurations` table.
//!
//! Configurations are never deleted one by one: retiring a station flips
//! `is_active`, so car history that references it stays valid.

use cflows_core::context::RequestContext;
use cflows_core::error::CoreError;
use cflows_core::station::{
    normalize_station_name, validate_definition, validate_station_name, validate_statuses,
    StationCatalog, StationDefinition, DEFAULT_STATUS,
};
use cflows_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{classify_unique_violation, not_found, DbResult};
use crate::models::station_configuration::{
    CreateStationConfiguration, StationConfiguration, UpdateStationConfiguration,
};
use crate::repositories::CarRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, organization_id, name, description, display_order, is_active, \
    default_status, allowed_statuses, required, created_at, updated_at";

const ENTITY: &str = "station configuration";

/// Provides CRUD operations for station configurations.
pub struct StationConfigurationRepo;

impl StationConfigurationRepo {
    /// Insert a new station configuration for the context's organization.
    ///
    /// Fails with `InvalidConfig` if the default status is not allowed or the
    /// status list is empty, and with `DuplicateName` if the organization
    /// already has a station with this name (ignoring case).
    pub async fn create(
        pool: &PgPool,
        ctx: &RequestContext,
        input: &CreateStationConfiguration,
    ) -> DbResult<StationConfiguration> {
        let name = input.name.trim();
        validate_station_name(name)?;
        let default_status = input.default_status.as_deref().unwrap_or(DEFAULT_STATUS);
        validate_statuses(&input.allowed_statuses, default_status)?;
        input
            .validate()
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;

        let query = format!(
            "INSERT INTO station_configurations
                (organization_id, name, description, display_order, default_status,
                 allowed_statuses, required)
             VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, 0), $5, $6, COALESCE($7, false))
             RETURNING {COLUMNS}"
        );
        let config = sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(ctx.organization_id)
            .bind(name)
            .bind(&input.description)
            .bind(input.display_order)
            .bind(default_status)
            .bind(Json(&input.allowed_statuses))
            .bind(input.required)
            .fetch_one(pool)
            .await
            .map_err(|e| classify_unique_violation(e, ENTITY, name))?;

        tracing::info!(
            organization_id = ctx.organization_id,
            station_id = config.id,
            station = %config.name,
            "Station configuration created"
        );
        Ok(config)
    }

    /// Find a configuration by ID within the context's organization.
    pub async fn find_by_id(
        pool: &PgPool,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<Option<StationConfiguration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations WHERE id = $1 AND organization_id = $2"
        );
        sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a configuration by name, ignoring case.
    pub async fn find_by_name(
        pool: &PgPool,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<StationConfiguration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations
             WHERE organization_id = $1 AND LOWER(name) = LOWER($2)"
        );
        sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(ctx.organization_id)
            .bind(name.trim())
            .fetch_optional(pool)
            .await
    }

    /// All configurations of the organization, active or not, in display order.
    pub async fn list(
        pool: &PgPool,
        ctx: &RequestContext,
    ) -> Result<Vec<StationConfiguration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations
             WHERE organization_id = $1
             ORDER BY display_order ASC, LOWER(name) ASC"
        );
        sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(ctx.organization_id)
            .fetch_all(pool)
            .await
    }

    /// Active configurations sorted by `(display_order, name)`.
    pub async fn list_active(
        pool: &PgPool,
        ctx: &RequestContext,
    ) -> Result<Vec<StationConfiguration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations
             WHERE organization_id = $1 AND is_active
             ORDER BY display_order ASC, LOWER(name) ASC"
        );
        sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(ctx.organization_id)
            .fetch_all(pool)
            .await
    }

    /// Update a configuration. Only non-`None` fields in `input` are applied.
    ///
    /// The merged status list and default are re-validated before writing.
    /// A rename moves every car's entry to the new key in the same
    /// transaction. Removing a status that a car of the organization still
    /// holds at this active station fails with `InvalidConfig`.
    pub async fn update(
        pool: &PgPool,
        ctx: &RequestContext,
        id: DbId,
        input: &UpdateStationConfiguration,
    ) -> DbResult<StationConfiguration> {
        input
            .validate()
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;

        // Car rows before the configuration row: transitions lock in that order.
        let renamed_from = match &input.name {
            Some(name) => Self::find_by_id(pool, ctx, id)
                .await?
                .map(|current| normalize_station_name(&current.name))
                .filter(|old_key| *old_key != normalize_station_name(name)),
            None => None,
        };

        let mut tx = pool.begin().await?;
        if let Some(old_key) = &renamed_from {
            CarRepo::lock_with_station(&mut *tx, ctx.organization_id, old_key).await?;
        }

        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations
             WHERE id = $1 AND organization_id = $2
             FOR UPDATE"
        );
        let current = sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("StationConfiguration", id))?;

        let mut merged = current.definition();
        if let Some(name) = &input.name {
            merged.name = name.trim().to_string();
        }
        if let Some(order) = input.display_order {
            merged.display_order = order;
        }
        if let Some(default_status) = &input.default_status {
            merged.default_status = default_status.clone();
        }
        if let Some(statuses) = &input.allowed_statuses {
            merged.allowed_statuses = statuses.clone();
        }
        if let Some(required) = input.required {
            merged.required = required;
        }
        validate_definition(&merged)?;

        let old_key = normalize_station_name(&current.name);
        if current.is_active {
            ensure_statuses_unused(&mut *tx, ctx.organization_id, &merged, &old_key).await?;
        }

        let query = format!(
            "UPDATE station_configurations SET
                name = $3,
                description = COALESCE($4, description),
                display_order = $5,
                default_status = $6,
                allowed_statuses = $7,
                required = $8
             WHERE id = $1 AND organization_id = $2
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .bind(&merged.name)
            .bind(&input.description)
            .bind(merged.display_order)
            .bind(&merged.default_status)
            .bind(Json(&merged.allowed_statuses))
            .bind(merged.required)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify_unique_violation(e, ENTITY, &merged.name))?;

        let new_key = merged.key();
        if new_key != old_key {
            let moved =
                CarRepo::rename_station_key(&mut *tx, ctx.organization_id, &old_key, &new_key)
                    .await?;
            tracing::info!(
                organization_id = ctx.organization_id,
                station_id = id,
                from = %old_key,
                to = %new_key,
                cars = moved,
                "Station renamed"
            );
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Activate or retire a station.
    ///
    /// Activation re-validates the stored configuration first, so an invalid
    /// configuration can never become active, and fails with `InvalidConfig`
    /// while a car holds a status the station no longer allows.
    pub async fn set_active(
        pool: &PgPool,
        ctx: &RequestContext,
        id: DbId,
        is_active: bool,
    ) -> DbResult<StationConfiguration> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations
             WHERE id = $1 AND organization_id = $2
             FOR UPDATE"
        );
        let current = sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("StationConfiguration", id))?;

        if is_active && !current.is_active {
            let definition = current.definition();
            validate_definition(&definition)?;
            ensure_statuses_unused(&mut *tx, ctx.organization_id, &definition, &definition.key())
                .await?;
        }

        let query = format!(
            "UPDATE station_configurations SET is_active = $3
             WHERE id = $1 AND organization_id = $2
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .bind(is_active)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            organization_id = ctx.organization_id,
            station = %updated.name,
            is_active,
            "Station activation changed"
        );
        Ok(updated)
    }

    /// Load the organization's catalog inside a transaction.
    ///
    /// Rows are read `FOR SHARE`, so admin edits wait until the caller's
    /// transaction ends and the engine sees one consistent snapshot.
    pub async fn load_catalog(
        conn: &mut PgConnection,
        organization_id: DbId,
    ) -> Result<StationCatalog, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM station_configurations
             WHERE organization_id = $1
             FOR SHARE"
        );
        let rows = sqlx::query_as::<_, StationConfiguration>(&query)
            .bind(organization_id)
            .fetch_all(conn)
            .await?;
        Ok(StationCatalog::new(rows.iter().map(StationConfiguration::definition)))
    }
}

/// Fail with `InvalidConfig` if a car holds a status at `key` that
/// `definition` does not allow.
async fn ensure_statuses_unused(
    conn: &mut PgConnection,
    organization_id: DbId,
    definition: &StationDefinition,
    key: &str,
) -> DbResult<()> {
    let cars =
        CarRepo::find_with_status_outside(conn, organization_id, key, &definition.allowed_statuses)
            .await?;
    if cars.is_empty() {
        return Ok(());
    }

    let held: Vec<String> = cars
        .iter()
        .map(|car| {
            let status = car.station_state.0.status_of(key).unwrap_or_default();
            format!("{} is '{status}'", car.label())
        })
        .collect();
    Err(CoreError::InvalidConfig(format!(
        "Station '{}' must keep the statuses its cars hold: {}",
        definition.name,
        held.join(", ")
    ))
    .into())
}
