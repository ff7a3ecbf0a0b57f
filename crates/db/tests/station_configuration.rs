//! Integration tests for station configurations.
//!
//! - Create with validation of statuses and default
//! - Case-insensitive name uniqueness per organization
//! - Update re-validation, activation, display ordering
//! - Renames and status edits against existing car state
//! - Catalog loading

use assert_matches::assert_matches;
use cflows_core::context::RequestContext;
use cflows_core::error::CoreError;
use cflows_db::error::DbError;
use cflows_db::models::car::{CreateCar, TransitionRequest};
use cflows_db::models::organization::CreateOrganization;
use cflows_db::models::station_configuration::{
    CreateStationConfiguration, UpdateStationConfiguration,
};
use cflows_db::repositories::{
    CarRepo, OrganizationRepo, StationConfigurationRepo, StationWorkflowRepo,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_org(pool: &PgPool, name: &str) -> RequestContext {
    let org = OrganizationRepo::create(
        pool,
        &CreateOrganization {
            name: name.to_string(),
            slug: None,
            owner_id: None,
        },
    )
    .await
    .unwrap();
    RequestContext::system(org.id)
}

fn new_station(name: &str, order: i32, statuses: &[&str]) -> CreateStationConfiguration {
    CreateStationConfiguration {
        name: name.to_string(),
        description: Some(format!("{name} station")),
        display_order: Some(order),
        default_status: None,
        allowed_statuses: statuses.iter().map(|s| s.to_string()).collect(),
        required: Some(true),
    }
}

fn move_to(car_id: i64, station: &str, status: &str) -> TransitionRequest {
    TransitionRequest {
        car_id,
        station: station.to_string(),
        status: status.to_string(),
        timestamp: None,
    }
}

// ---------------------------------------------------------------------------
// Test: create
// ---------------------------------------------------------------------------

#[test]
fn test_non_string_statuses_do_not_deserialize() {
    let payload = serde_json::json!({"name": "paint", "allowed_statuses": ["pending", 1]});
    assert!(serde_json::from_value::<CreateStationConfiguration>(payload).is_err());

    let payload = serde_json::json!({"name": "paint", "allowed_statuses": "pending"});
    assert!(serde_json::from_value::<CreateStationConfiguration>(payload).is_err());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_station(pool: PgPool) {
    let ctx = new_org(&pool, "Acme").await;

    let station = StationConfigurationRepo::create(
        &pool,
        &ctx,
        &new_station("Inspection", 1, &["pending", "passed", "failed"]),
    )
    .await
    .unwrap();

    assert_eq!(station.name, "Inspection");
    assert_eq!(station.default_status, "pending");
    assert_eq!(station.allowed_statuses.0, vec!["pending", "passed", "failed"]);
    assert!(station.is_active);
    assert!(station.required);

    let found = StationConfigurationRepo::find_by_name(&pool, &ctx, " INSPECTION ")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, station.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_rejects_bad_statuses(pool: PgPool) {
    let ctx = new_org(&pool, "Acme").await;

    // Default "pending" is not in the list.
    let result =
        StationConfigurationRepo::create(&pool, &ctx, &new_station("wash", 0, &["waiting", "done"])).await;
    assert_matches!(result, Err(DbError::Core(CoreError::InvalidConfig(_))));

    let result = StationConfigurationRepo::create(&pool, &ctx, &new_station("wash", 0, &[])).await;
    assert_matches!(result, Err(DbError::Core(CoreError::InvalidConfig(_))));

    let mut negative = new_station("wash", 0, &["pending"]);
    negative.display_order = Some(-1);
    let result = StationConfigurationRepo::create(&pool, &ctx, &negative).await;
    assert_matches!(result, Err(DbError::Core(CoreError::InvalidConfig(_))));

    assert!(StationConfigurationRepo::list(&pool, &ctx).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_name_per_organization(pool: PgPool) {
    let acme = new_org(&pool, "Acme").await;
    let globex = new_org(&pool, "Globex").await;

    StationConfigurationRepo::create(&pool, &acme, &new_station("Inspection", 0, &["pending"]))
        .await
        .unwrap();

    let dup =
        StationConfigurationRepo::create(&pool, &acme, &new_station("inspection", 1, &["pending"])).await;
    assert_matches!(dup, Err(DbError::Core(CoreError::DuplicateName { .. })));

    // Another organization may reuse the name.
    StationConfigurationRepo::create(&pool, &globex, &new_station("inspection", 0, &["pending"]))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: update and activation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_revalidates(pool: PgPool) {
    let ctx = new_org(&pool, "Acme").await;
    let station =
        StationConfigurationRepo::create(&pool, &ctx, &new_station("paint", 0, &["pending", "done"]))
            .await
            .unwrap();

    // Dropping the default from the list is refused.
    let bad = UpdateStationConfiguration {
        allowed_statuses: Some(vec!["done".into()]),
        ..Default::default()
    };
    assert_matches!(
        StationConfigurationRepo::update(&pool, &ctx, station.id, &bad).await,
        Err(DbError::Core(CoreError::InvalidConfig(_)))
    );

    let good = UpdateStationConfiguration {
        allowed_statuses: Some(vec!["todo".into(), "done".into()]),
        default_status: Some("todo".into()),
        display_order: Some(5),
        ..Default::default()
    };
    let updated = StationConfigurationRepo::update(&pool, &ctx, station.id, &good)
        .await
        .unwrap();
    assert_eq!(updated.default_status, "todo");
    assert_eq!(updated.display_order, 5);
    assert_eq!(updated.description, "paint station");

    let other = new_org(&pool, "Globex").await;
    assert_matches!(
        StationConfigurationRepo::update(&pool, &other, station.id, &good).await,
        Err(DbError::Core(CoreError::NotFound { .. }))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_active_in_display_order(pool: PgPool) {
    let ctx = new_org(&pool, "Acme").await;
    StationConfigurationRepo::create(&pool, &ctx, &new_station("wash", 2, &["pending"]))
        .await
        .unwrap();
    let paint = StationConfigurationRepo::create(&pool, &ctx, &new_station("Paint", 1, &["pending"]))
        .await
        .unwrap();
    StationConfigurationRepo::create(&pool, &ctx, &new_station("body", 1, &["pending"]))
        .await
        .unwrap();

    let names: Vec<String> = StationConfigurationRepo::list_active(&pool, &ctx)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["body", "Paint", "wash"]);

    let retired = StationConfigurationRepo::set_active(&pool, &ctx, paint.id, false)
        .await
        .unwrap();
    assert!(!retired.is_active);
    assert_eq!(StationConfigurationRepo::list_active(&pool, &ctx).await.unwrap().len(), 2);
    assert_eq!(StationConfigurationRepo::list(&pool, &ctx).await.unwrap().len(), 3);

    let restored = StationConfigurationRepo::set_active(&pool, &ctx, paint.id, true)
        .await
        .unwrap();
    assert!(restored.is_active);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_load_catalog_includes_inactive(pool: PgPool) {
    let ctx = new_org(&pool, "Acme").await;
    let wash = StationConfigurationRepo::create(&pool, &ctx, &new_station("Wash", 0, &["pending"]))
        .await
        .unwrap();
    StationConfigurationRepo::create(&pool, &ctx, &new_station("paint", 1, &["pending"]))
        .await
        .unwrap();
    StationConfigurationRepo::set_active(&pool, &ctx, wash.id, false)
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let catalog = StationConfigurationRepo::load_catalog(&mut conn, ctx.organization_id)
        .await
        .unwrap();
    assert_eq!(catalog.len(), 2);
    assert!(catalog.get("wash").is_some());
    assert!(catalog.get_active("wash").is_none());
    assert_eq!(catalog.active().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: edits against existing cars
// ---------------------------------------------------------------------------

/// Acme with "inspection" and "wash", plus one car failed at inspection.
async fn acme_with_failed_car(pool: &PgPool) -> (RequestContext, i64, i64) {
    let ctx = new_org(pool, "Acme").await;
    let inspection = StationConfigurationRepo::create(
        pool,
        &ctx,
        &new_station("inspection", 0, &["pending", "passed", "failed"]),
    )
    .await
    .unwrap();
    StationConfigurationRepo::create(pool, &ctx, &new_station("wash", 1, &["pending", "done"]))
        .await
        .unwrap();
    let car = CarRepo::create(
        pool,
        &ctx,
        &CreateCar {
            make: "Volvo".into(),
            model: "V70".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    StationWorkflowRepo::transition(pool, &ctx, &move_to(car.id, "inspection", "failed"))
        .await
        .unwrap();
    (ctx, inspection.id, car.id)
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rename_moves_car_state(pool: PgPool) {
    let (ctx, inspection_id, car_id) = acme_with_failed_car(&pool).await;

    let rename = UpdateStationConfiguration {
        name: Some("Inspection Bay".into()),
        ..Default::default()
    };
    let renamed = StationConfigurationRepo::update(&pool, &ctx, inspection_id, &rename)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Inspection Bay");

    let car = CarRepo::find_by_id(&pool, &ctx, car_id).await.unwrap().unwrap();
    assert!(car.station_state.get("inspection").is_none());
    let entry = car.station_state.get("inspection bay").unwrap();
    assert_eq!(entry.status, "failed");
    assert_eq!(entry.history.len(), 1);
    assert!(StationWorkflowRepo::validate(&pool, &ctx, car_id)
        .await
        .unwrap()
        .is_empty());

    // Other stations keep working.
    StationWorkflowRepo::transition(&pool, &ctx, &move_to(car_id, "wash", "done"))
        .await
        .unwrap();

    // A case-only change keeps the key.
    let recased = UpdateStationConfiguration {
        name: Some("INSPECTION BAY".into()),
        ..Default::default()
    };
    StationConfigurationRepo::update(&pool, &ctx, inspection_id, &recased)
        .await
        .unwrap();
    let car = CarRepo::find_by_id(&pool, &ctx, car_id).await.unwrap().unwrap();
    assert_eq!(car.station_state.status_of("inspection bay"), Some("failed"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_removing_held_status_rejected(pool: PgPool) {
    let (ctx, inspection_id, car_id) = acme_with_failed_car(&pool).await;

    let narrow = UpdateStationConfiguration {
        allowed_statuses: Some(vec!["pending".into(), "passed".into()]),
        ..Default::default()
    };
    let result = StationConfigurationRepo::update(&pool, &ctx, inspection_id, &narrow).await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::InvalidConfig(msg))) if msg.contains("Volvo V70")
    );

    let station = StationConfigurationRepo::find_by_id(&pool, &ctx, inspection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(station.allowed_statuses.0, vec!["pending", "passed", "failed"]);
    StationWorkflowRepo::transition(&pool, &ctx, &move_to(car_id, "wash", "done"))
        .await
        .unwrap();

    // Once no car holds it, the status can go.
    StationWorkflowRepo::transition(&pool, &ctx, &move_to(car_id, "inspection", "passed"))
        .await
        .unwrap();
    let updated = StationConfigurationRepo::update(&pool, &ctx, inspection_id, &narrow)
        .await
        .unwrap();
    assert_eq!(updated.allowed_statuses.0, vec!["pending", "passed"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reactivation_checks_held_statuses(pool: PgPool) {
    let (ctx, inspection_id, car_id) = acme_with_failed_car(&pool).await;

    // Retired stations are frozen, so narrowing them is allowed.
    StationConfigurationRepo::set_active(&pool, &ctx, inspection_id, false)
        .await
        .unwrap();
    let narrow = UpdateStationConfiguration {
        allowed_statuses: Some(vec!["pending".into(), "passed".into()]),
        ..Default::default()
    };
    StationConfigurationRepo::update(&pool, &ctx, inspection_id, &narrow)
        .await
        .unwrap();

    assert_matches!(
        StationConfigurationRepo::set_active(&pool, &ctx, inspection_id, true).await,
        Err(DbError::Core(CoreError::InvalidConfig(_)))
    );
    StationWorkflowRepo::transition(&pool, &ctx, &move_to(car_id, "wash", "done"))
        .await
        .unwrap();
}
