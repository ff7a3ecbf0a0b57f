//! Integration tests for organization roles and memberships.

use assert_matches::assert_matches;
use cflows_core::error::CoreError;
use cflows_core::membership::ROLE_MEMBER;
use cflows_db::error::DbError;
use cflows_db::models::account::CreateAccount;
use cflows_db::models::organization::CreateOrganization;
use cflows_db::repositories::{AccountRepo, MembershipRepo, OrganizationRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup(pool: &PgPool) -> (i64, i64) {
    let org = OrganizationRepo::create(
        pool,
        &CreateOrganization {
            name: "Acme".to_string(),
            slug: None,
            owner_id: None,
        },
    )
    .await
    .unwrap();
    let account = AccountRepo::create(
        pool,
        &CreateAccount {
            email: "ada@acme.test".to_string(),
            first_name: None,
            last_name: None,
            is_staff: None,
        },
    )
    .await
    .unwrap();
    (org.id, account.id)
}

fn perms(names: &[&str]) -> Vec<String> {
    names.iter().map(|p| p.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Test: roles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_assign_undefined_role_fails(pool: PgPool) {
    let (org_id, account_id) = setup(&pool).await;

    let result = MembershipRepo::assign_role(&pool, org_id, account_id, "inspector").await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::UnknownRole(name))) if name == "inspector"
    );
    assert!(MembershipRepo::find_member(&pool, org_id, account_id)
        .await
        .unwrap()
        .is_none());

    // Without a "member" role, the default membership fails the same way.
    let result = MembershipRepo::add_member(&pool, org_id, account_id, None).await;
    assert_matches!(result, Err(DbError::Core(CoreError::UnknownRole(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_add_role_upserts(pool: PgPool) {
    let (org_id, _) = setup(&pool).await;

    let role = MembershipRepo::add_role(&pool, org_id, "inspector", &perms(&["car.view"]))
        .await
        .unwrap();
    let again = MembershipRepo::add_role(
        &pool,
        org_id,
        "inspector",
        &perms(&["station.transition", " car.view ", ""]),
    )
    .await
    .unwrap();
    assert_eq!(again.id, role.id);
    assert_eq!(again.permissions.0, perms(&["car.view", "station.transition"]));

    assert_matches!(
        MembershipRepo::add_role(&pool, org_id, "", &[]).await,
        Err(DbError::Core(CoreError::Validation(_)))
    );
    assert_eq!(MembershipRepo::list_roles(&pool, org_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_assign_role_replaces_previous(pool: PgPool) {
    let (org_id, account_id) = setup(&pool).await;
    MembershipRepo::add_role(&pool, org_id, ROLE_MEMBER, &perms(&["car.view"]))
        .await
        .unwrap();
    MembershipRepo::add_role(&pool, org_id, "inspector", &perms(&["car.view", "station.transition"]))
        .await
        .unwrap();

    let member = MembershipRepo::add_member(&pool, org_id, account_id, None)
        .await
        .unwrap();
    assert_eq!(member.role_name.as_deref(), Some(ROLE_MEMBER));

    // Adding again updates the existing membership.
    let again = MembershipRepo::add_member(&pool, org_id, account_id, Some(ROLE_MEMBER))
        .await
        .unwrap();
    assert_eq!(again.id, member.id);

    let member = MembershipRepo::assign_role(&pool, org_id, account_id, "inspector")
        .await
        .unwrap();
    assert_eq!(member.role_name.as_deref(), Some("inspector"));
    assert_eq!(
        MembershipRepo::list_members(&pool, org_id, None).await.unwrap().len(),
        1
    );

    let role = MembershipRepo::get_member_role(&pool, org_id, account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(role.name, "inspector");
    assert_eq!(
        MembershipRepo::get_member_permissions(&pool, org_id, account_id)
            .await
            .unwrap(),
        perms(&["car.view", "station.transition"])
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_remove_role_keeps_members(pool: PgPool) {
    let (org_id, account_id) = setup(&pool).await;
    MembershipRepo::add_role(&pool, org_id, "inspector", &perms(&["station.transition"]))
        .await
        .unwrap();
    MembershipRepo::assign_role(&pool, org_id, account_id, "inspector")
        .await
        .unwrap();

    assert!(MembershipRepo::remove_role(&pool, org_id, "inspector").await.unwrap());
    assert!(!MembershipRepo::remove_role(&pool, org_id, "inspector").await.unwrap());

    let member = MembershipRepo::find_member(&pool, org_id, account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.role_name, None);
    assert!(MembershipRepo::get_member_role(&pool, org_id, account_id)
        .await
        .unwrap()
        .is_none());
    assert!(MembershipRepo::get_member_permissions(&pool, org_id, account_id)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_remove_member(pool: PgPool) {
    let (org_id, account_id) = setup(&pool).await;
    MembershipRepo::add_role(&pool, org_id, ROLE_MEMBER, &[]).await.unwrap();
    MembershipRepo::add_member(&pool, org_id, account_id, None)
        .await
        .unwrap();

    assert!(MembershipRepo::remove_member(&pool, org_id, account_id).await.unwrap());
    assert!(!MembershipRepo::remove_member(&pool, org_id, account_id).await.unwrap());
    assert!(MembershipRepo::list_members(&pool, org_id, Some(ROLE_MEMBER))
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_load_role_book(pool: PgPool) {
    let (org_id, account_id) = setup(&pool).await;
    MembershipRepo::add_role(&pool, org_id, "inspector", &perms(&["station.transition"]))
        .await
        .unwrap();
    MembershipRepo::add_member(&pool, org_id, account_id, Some("inspector"))
        .await
        .unwrap();

    let book = MembershipRepo::load_role_book(&pool, org_id).await.unwrap();
    assert!(book.has_permission(account_id, "station.transition"));
    assert_eq!(book.members_with_role("inspector"), vec![account_id]);
    assert_matches!(
        book.require_permission(account_id, "org.admin"),
        Err(CoreError::Forbidden(_))
    );
}
