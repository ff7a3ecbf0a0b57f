//! Persists station workflow changes on cars.
//!
//! Each write runs in one transaction: the car row is locked `FOR UPDATE`, the
//! organization's station configurations are read `FOR SHARE`, the pure
//! engine in [`cflows_core::workflow`] computes the new map, and the result is
//! written back before commit. Two transitions on the same car therefore
//! serialize, and neither can lose the other's history entry.

use cflows_core::context::RequestContext;
use cflows_core::station::normalize_station_name;
use cflows_core::types::DbId;
use cflows_core::workflow::{self, StationStateMap, StationViolation};
use chrono::Utc;
use sqlx::PgPool;

use crate::error::{not_found, DbError, DbResult};
use crate::models::car::{Car, CarAudit, TransitionRequest};
use crate::repositories::car_repo::COLUMNS as CAR_COLUMNS;
use crate::repositories::{CarRepo, StationConfigurationRepo};

/// Station workflow operations on cars.
pub struct StationWorkflowRepo;

impl StationWorkflowRepo {
    /// Seed missing entries for the organization's active stations.
    ///
    /// Existing entries are never overwritten, so calling this after a new
    /// station was added only adds that station.
    pub async fn initialize(pool: &PgPool, ctx: &RequestContext, car_id: DbId) -> DbResult<Car> {
        let mut tx = pool.begin().await?;

        let car = CarRepo::lock_for_update(&mut *tx, ctx.organization_id, car_id)
            .await?
            .ok_or_else(|| not_found("Car", car_id))?;
        let catalog = StationConfigurationRepo::load_catalog(&mut *tx, ctx.organization_id).await?;

        let mut state = car.station_state.0.clone();
        let added = workflow::initialize(&mut state, &catalog);
        if added == 0 {
            tx.commit().await?;
            return Ok(car);
        }
        workflow::validate(&state, &catalog)?;

        let updated = CarRepo::write_station_state(&mut *tx, car_id, &state).await?;
        tx.commit().await?;

        tracing::info!(
            organization_id = ctx.organization_id,
            car_id,
            added,
            "Station state initialized"
        );
        Ok(updated)
    }

    /// Change one station's status, appending to its history.
    ///
    /// Fails with `NotFound` if the car is not in the organization,
    /// `UnknownStation` or `InvalidStatus` for a bad request, and
    /// `ConfigMismatch` if any other entry of the car is invalid. Nothing is
    /// written on failure.
    pub async fn transition(
        pool: &PgPool,
        ctx: &RequestContext,
        request: &TransitionRequest,
    ) -> DbResult<Car> {
        let mut tx = pool.begin().await?;

        let car = CarRepo::lock_for_update(&mut *tx, ctx.organization_id, request.car_id)
            .await?
            .ok_or_else(|| not_found("Car", request.car_id))?;
        let catalog = StationConfigurationRepo::load_catalog(&mut *tx, ctx.organization_id).await?;

        let actor = ctx.actor.label();
        let timestamp = request.timestamp.unwrap_or_else(Utc::now);
        let next = match workflow::transition(
            &car.station_state,
            &catalog,
            &request.station,
            &request.status,
            Some(&actor),
            timestamp,
        ) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(
                    organization_id = ctx.organization_id,
                    car_id = request.car_id,
                    station = %request.station,
                    status = %request.status,
                    code = e.code(),
                    error = %e,
                    "Station transition rejected"
                );
                return Err(DbError::Core(e));
            }
        };

        let station = normalize_station_name(&request.station);
        let from = car.station_state.status_of(&station).unwrap_or_default().to_string();
        let updated = CarRepo::write_station_state(&mut *tx, request.car_id, &next).await?;
        tx.commit().await?;

        tracing::info!(
            organization_id = ctx.organization_id,
            car_id = request.car_id,
            station = %station,
            from = %from,
            to = %request.status,
            actor = %actor,
            "Station transition applied"
        );
        Ok(updated)
    }

    /// Replace a car's whole station state map, e.g. when importing data.
    ///
    /// The map is validated against the catalog first and stored unchanged.
    pub async fn replace_state(
        pool: &PgPool,
        ctx: &RequestContext,
        car_id: DbId,
        state: &StationStateMap,
    ) -> DbResult<Car> {
        let mut tx = pool.begin().await?;

        CarRepo::lock_for_update(&mut *tx, ctx.organization_id, car_id)
            .await?
            .ok_or_else(|| not_found("Car", car_id))?;
        let catalog = StationConfigurationRepo::load_catalog(&mut *tx, ctx.organization_id).await?;
        workflow::validate(state, &catalog)?;

        let updated = CarRepo::write_station_state(&mut *tx, car_id, state).await?;
        tx.commit().await?;

        tracing::info!(
            organization_id = ctx.organization_id,
            car_id,
            stations = state.len(),
            "Station state replaced"
        );
        Ok(updated)
    }

    /// Every violation in one car's stored station state.
    pub async fn validate(
        pool: &PgPool,
        ctx: &RequestContext,
        car_id: DbId,
    ) -> DbResult<Vec<StationViolation>> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {CAR_COLUMNS} FROM cars
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        );
        let car = sqlx::query_as::<_, Car>(&query)
            .bind(car_id)
            .bind(ctx.organization_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("Car", car_id))?;
        let catalog = StationConfigurationRepo::load_catalog(&mut *tx, ctx.organization_id).await?;
        tx.commit().await?;

        Ok(workflow::collect_violations(&car.station_state, &catalog))
    }

    /// Audit every non-deleted car of an organization.
    ///
    /// Only cars with at least one violation are returned, ordered by id.
    pub async fn audit_organization(pool: &PgPool, organization_id: DbId) -> DbResult<Vec<CarAudit>> {
        let mut tx = pool.begin().await?;

        let catalog = StationConfigurationRepo::load_catalog(&mut *tx, organization_id).await?;
        let query = format!(
            "SELECT {CAR_COLUMNS} FROM cars
             WHERE organization_id = $1 AND deleted_at IS NULL
             ORDER BY id ASC"
        );
        let cars = sqlx::query_as::<_, Car>(&query)
            .bind(organization_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let audits: Vec<CarAudit> = cars
            .iter()
            .filter_map(|car| {
                let violations = workflow::collect_violations(&car.station_state, &catalog);
                (!violations.is_empty()).then(|| CarAudit {
                    car_id: car.id,
                    label: car.label(),
                    violations,
                })
            })
            .collect();

        tracing::debug!(
            organization_id,
            cars = cars.len(),
            mismatched = audits.len(),
            "Organization audited"
        );
        Ok(audits)
    }
}
