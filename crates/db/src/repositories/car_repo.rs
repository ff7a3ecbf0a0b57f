//! Repository for the `cars` table.
//!
//! Every query is scoped to the context's organization: a car that belongs
//! to another organization behaves as if it did not exist.

use cflows_core::context::RequestContext;
use cflows_core::types::DbId;
use cflows_core::vehicle::{
    normalize_tags, parse_registration, validate_mileage, validate_year, CarFilter, DEFAULT_COLOR,
};
use cflows_core::workflow::{self, StationStateMap};
use chrono::{Datelike, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{classify_unique_violation, DbResult};
use crate::models::car::{Car, CreateCar, UpdateCar};
use crate::repositories::StationConfigurationRepo;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, organization_id, make, model, registration_number, color, \
    year, mileage, is_active, is_archived, deleted_at, station_state, metadata, tags, notes, \
    messages, custom_info, created_at, updated_at";

/// Provides CRUD and listing operations for cars.
pub struct CarRepo;

impl CarRepo {
    /// Insert a new car, seeding its station state from the organization's
    /// active station configurations in the same transaction.
    pub async fn create(pool: &PgPool, ctx: &RequestContext, input: &CreateCar) -> DbResult<Car> {
        input.validate()?;
        let registration = parse_registration(input.registration_number.as_deref())?;
        validate_numbers(input.year, input.mileage)?;

        let mut tx = pool.begin().await?;

        let catalog = StationConfigurationRepo::load_catalog(&mut *tx, ctx.organization_id).await?;
        let mut station_state = StationStateMap::new();
        workflow::initialize(&mut station_state, &catalog);
        workflow::validate(&station_state, &catalog)?;

        let query = format!(
            "INSERT INTO cars
                (organization_id, make, model, registration_number, color, year, mileage,
                 station_state, metadata, tags, notes, messages, custom_info)
             VALUES ($1, $2, $3, $4, COALESCE($5, '{DEFAULT_COLOR}'), $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {COLUMNS}"
        );
        let car = sqlx::query_as::<_, Car>(&query)
            .bind(ctx.organization_id)
            .bind(input.make.trim())
            .bind(input.model.trim())
            .bind(&registration)
            .bind(input.color.as_deref().map(str::trim))
            .bind(input.year)
            .bind(input.mileage)
            .bind(Json(&station_state))
            .bind(Json(input.metadata.clone().unwrap_or_default()))
            .bind(Json(normalize_tags(input.tags.iter().flatten())))
            .bind(Json(input.notes.clone().unwrap_or_default()))
            .bind(Json(input.messages.clone().unwrap_or_default()))
            .bind(Json(input.custom_info.clone().unwrap_or_default()))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                classify_unique_violation(
                    e,
                    "registration number",
                    registration.as_deref().unwrap_or_default(),
                )
            })?;

        tx.commit().await?;

        tracing::info!(
            organization_id = ctx.organization_id,
            car_id = car.id,
            stations = station_state.len(),
            "Car created"
        );
        Ok(car)
    }

    /// Find a car by ID within the organization. Excludes soft-deleted rows.
    pub async fn find_by_id(
        pool: &PgPool,
        ctx: &RequestContext,
        id: DbId,
    ) -> Result<Option<Car>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cars
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, Car>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a car by registration number within the organization.
    pub async fn find_by_registration(
        pool: &PgPool,
        ctx: &RequestContext,
        registration_number: &str,
    ) -> DbResult<Option<Car>> {
        let Some(registration) = parse_registration(Some(registration_number))? else {
            return Ok(None);
        };
        let query = format!(
            "SELECT {COLUMNS} FROM cars
             WHERE registration_number = $1 AND organization_id = $2 AND deleted_at IS NULL"
        );
        Ok(sqlx::query_as::<_, Car>(&query)
            .bind(registration)
            .bind(ctx.organization_id)
            .fetch_optional(pool)
            .await?)
    }

    /// List the organization's cars, newest first. Excludes soft-deleted and
    /// archived rows unless `include_archived` is set.
    pub async fn list(
        pool: &PgPool,
        ctx: &RequestContext,
        include_archived: bool,
    ) -> Result<Vec<Car>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cars
             WHERE organization_id = $1 AND deleted_at IS NULL AND (NOT is_archived OR $2)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Car>(&query)
            .bind(ctx.organization_id)
            .bind(include_archived)
            .fetch_all(pool)
            .await
    }

    /// Filter the organization's cars by make/model substring and exact year.
    pub async fn filter(
        pool: &PgPool,
        ctx: &RequestContext,
        filter: &CarFilter,
    ) -> Result<Vec<Car>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cars
             WHERE organization_id = $1 AND deleted_at IS NULL AND NOT is_archived
               AND ($2::TEXT IS NULL OR make ILIKE $2)
               AND ($3::TEXT IS NULL OR model ILIKE $3)
               AND ($4::INTEGER IS NULL OR year = $4)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Car>(&query)
            .bind(ctx.organization_id)
            .bind(filter.make_pattern())
            .bind(filter.model_pattern())
            .bind(filter.year)
            .fetch_all(pool)
            .await
    }

    /// Update a car's descriptive fields. Only non-`None` fields are applied;
    /// a blank registration number clears it.
    ///
    /// Returns `None` if the car does not exist in the organization.
    pub async fn update(
        pool: &PgPool,
        ctx: &RequestContext,
        id: DbId,
        input: &UpdateCar,
    ) -> DbResult<Option<Car>> {
        input.validate()?;
        let registration = parse_registration(input.registration_number.as_deref())?;
        let clear_registration = input.registration_number.is_some() && registration.is_none();
        validate_numbers(input.year, input.mileage)?;

        let query = format!(
            "UPDATE cars SET
                make = COALESCE($3, make),
                model = COALESCE($4, model),
                registration_number = CASE WHEN $15 THEN NULL ELSE COALESCE($5, registration_number) END,
                color = COALESCE($6, color),
                year = COALESCE($7, year),
                mileage = COALESCE($8, mileage),
                is_active = COALESCE($9, is_active),
                metadata = COALESCE($10, metadata),
                tags = COALESCE($11, tags),
                notes = COALESCE($12, notes),
                messages = COALESCE($13, messages),
                custom_info = COALESCE($14, custom_info)
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        let car = sqlx::query_as::<_, Car>(&query)
            .bind(id)
            .bind(ctx.organization_id)
            .bind(input.make.as_deref().map(str::trim))
            .bind(input.model.as_deref().map(str::trim))
            .bind(&registration)
            .bind(input.color.as_deref().map(str::trim))
            .bind(input.year)
            .bind(input.mileage)
            .bind(input.is_active)
            .bind(input.metadata.as_ref().map(Json))
            .bind(input.tags.as_ref().map(|t| Json(normalize_tags(t))))
            .bind(input.notes.as_ref().map(Json))
            .bind(input.messages.as_ref().map(Json))
            .bind(input.custom_info.as_ref().map(Json))
            .bind(clear_registration)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                classify_unique_violation(
                    e,
                    "registration number",
                    registration.as_deref().unwrap_or_default(),
                )
            })?;
        Ok(car)
    }

    /// Archive or unarchive a car. Returns `true` if a row changed.
    pub async fn set_archived(
        pool: &PgPool,
        ctx: &RequestContext,
        id: DbId,
        archived: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cars SET is_archived = $3
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL AND is_archived <> $3",
        )
        .bind(id)
        .bind(ctx.organization_id)
        .bind(archived)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a car. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, ctx: &RequestContext, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cars SET deleted_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(ctx.organization_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted car. Returns `true` if a row was restored.
    pub async fn restore(pool: &PgPool, ctx: &RequestContext, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cars SET deleted_at = NULL
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .bind(ctx.organization_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lock a car row for the rest of the caller's transaction.
    pub(crate) async fn lock_for_update(
        conn: &mut PgConnection,
        organization_id: DbId,
        id: DbId,
    ) -> Result<Option<Car>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cars
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             FOR UPDATE"
        );
        sqlx::query_as::<_, Car>(&query)
            .bind(id)
            .bind(organization_id)
            .fetch_optional(conn)
            .await
    }

    /// Write a new station state map for a car locked by the caller.
    pub(crate) async fn write_station_state(
        conn: &mut PgConnection,
        id: DbId,
        state: &StationStateMap,
    ) -> Result<Car, sqlx::Error> {
        let query = format!(
            "UPDATE cars SET station_state = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Car>(&query)
            .bind(id)
            .bind(Json(state))
            .fetch_one(conn)
            .await
    }

    /// Lock every car of the organization that has an entry for `key`,
    /// in id order.
    pub(crate) async fn lock_with_station(
        conn: &mut PgConnection,
        organization_id: DbId,
        key: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM cars
             WHERE organization_id = $1 AND station_state ? $2
             ORDER BY id ASC
             FOR UPDATE",
        )
        .bind(organization_id)
        .bind(key)
        .fetch_all(conn)
        .await
    }

    /// Move every car's entry from `old_key` to `new_key`, keeping status
    /// and history. Soft-deleted cars are included.
    pub(crate) async fn rename_station_key(
        conn: &mut PgConnection,
        organization_id: DbId,
        old_key: &str,
        new_key: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cars
             SET station_state = (station_state - $2) || jsonb_build_object($3::TEXT, station_state -> $2)
             WHERE organization_id = $1 AND station_state ? $2",
        )
        .bind(organization_id)
        .bind(old_key)
        .bind(new_key)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Non-deleted cars whose status at `key` is not in `allowed`.
    pub(crate) async fn find_with_status_outside(
        conn: &mut PgConnection,
        organization_id: DbId,
        key: &str,
        allowed: &[String],
    ) -> Result<Vec<Car>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cars
             WHERE organization_id = $1 AND deleted_at IS NULL
               AND station_state ? $2
               AND NOT (station_state -> $2 ->> 'status' = ANY($3))
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Car>(&query)
            .bind(organization_id)
            .bind(key)
            .bind(allowed)
            .fetch_all(conn)
            .await
    }
}

fn validate_numbers(year: Option<i32>, mileage: Option<i32>) -> DbResult<()> {
    if let Some(year) = year {
        validate_year(year, Utc::now().year())?;
    }
    if let Some(mileage) = mileage {
        validate_mileage(mileage)?;
    }
    Ok(())
}
