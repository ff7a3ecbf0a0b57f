//! Repository for `organization_roles` and `organization_members`.
//!
//! A member holds at most one role per organization; the `role_name` column
//! is the member-to-role index and `uq_organization_members_org_account`
//! enforces the single membership.

use cflows_core::error::CoreError;
use cflows_core::membership::{
    normalize_permissions, validate_role_name, RoleBook, ROLE_MEMBER,
};
use cflows_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::error::DbResult;
use crate::models::membership::{OrganizationMember, OrganizationRole};

const ROLE_COLUMNS: &str = "id, organization_id, name, permissions, created_at, updated_at";

const MEMBER_COLUMNS: &str = "id, organization_id, account_id, role_name, created_at, updated_at";

/// Role and membership operations for one organization at a time.
pub struct MembershipRepo;

impl MembershipRepo {
    /// Create a role or replace the permissions of an existing one.
    pub async fn add_role(
        pool: &PgPool,
        organization_id: DbId,
        role_name: &str,
        permissions: &[String],
    ) -> DbResult<OrganizationRole> {
        validate_role_name(role_name)?;
        let permissions: Vec<String> = normalize_permissions(permissions).into_iter().collect();

        let query = format!(
            "INSERT INTO organization_roles (organization_id, name, permissions)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_organization_roles_org_name
             DO UPDATE SET permissions = EXCLUDED.permissions
             RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, OrganizationRole>(&query)
            .bind(organization_id)
            .bind(role_name)
            .bind(Json(&permissions))
            .fetch_one(pool)
            .await?;

        tracing::info!(
            organization_id,
            role = %role.name,
            permissions = permissions.len(),
            "Role saved"
        );
        Ok(role)
    }

    /// Delete a role. Members holding it stay members without a role.
    ///
    /// Returns `false` if the role did not exist.
    pub async fn remove_role(pool: &PgPool, organization_id: DbId, role_name: &str) -> DbResult<bool> {
        let mut tx = pool.begin().await?;

        let detached = sqlx::query(
            "UPDATE organization_members SET role_name = NULL
             WHERE organization_id = $1 AND role_name = $2",
        )
        .bind(organization_id)
        .bind(role_name)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let result = sqlx::query("DELETE FROM organization_roles WHERE organization_id = $1 AND name = $2")
            .bind(organization_id)
            .bind(role_name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(organization_id, role = role_name, detached, "Role removed");
        }
        Ok(removed)
    }

    pub async fn find_role(
        pool: &PgPool,
        organization_id: DbId,
        role_name: &str,
    ) -> Result<Option<OrganizationRole>, sqlx::Error> {
        let query = format!(
            "SELECT {ROLE_COLUMNS} FROM organization_roles WHERE organization_id = $1 AND name = $2"
        );
        sqlx::query_as::<_, OrganizationRole>(&query)
            .bind(organization_id)
            .bind(role_name)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_roles(
        pool: &PgPool,
        organization_id: DbId,
    ) -> Result<Vec<OrganizationRole>, sqlx::Error> {
        let query = format!(
            "SELECT {ROLE_COLUMNS} FROM organization_roles
             WHERE organization_id = $1
             ORDER BY name ASC"
        );
        sqlx::query_as::<_, OrganizationRole>(&query)
            .bind(organization_id)
            .fetch_all(pool)
            .await
    }

    /// Give an account a role, creating its membership if needed and
    /// replacing any role it held before.
    ///
    /// Fails with `UnknownRole` if the organization has no such role.
    pub async fn assign_role(
        pool: &PgPool,
        organization_id: DbId,
        account_id: DbId,
        role_name: &str,
    ) -> DbResult<OrganizationMember> {
        let mut tx = pool.begin().await?;
        lock_role(&mut *tx, organization_id, role_name).await?;

        let query = format!(
            "INSERT INTO organization_members (organization_id, account_id, role_name)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_organization_members_org_account
             DO UPDATE SET role_name = EXCLUDED.role_name
             RETURNING {MEMBER_COLUMNS}"
        );
        let member = sqlx::query_as::<_, OrganizationMember>(&query)
            .bind(organization_id)
            .bind(account_id)
            .bind(role_name)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(organization_id, account_id, role = role_name, "Role assigned");
        Ok(member)
    }

    /// Add an account to the organization, with the `member` role by default.
    ///
    /// An existing membership has its role replaced.
    pub async fn add_member(
        pool: &PgPool,
        organization_id: DbId,
        account_id: DbId,
        role_name: Option<&str>,
    ) -> DbResult<OrganizationMember> {
        Self::assign_role(pool, organization_id, account_id, role_name.unwrap_or(ROLE_MEMBER)).await
    }

    /// Remove an account from the organization. Returns `false` if it was
    /// not a member.
    pub async fn remove_member(
        pool: &PgPool,
        organization_id: DbId,
        account_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM organization_members WHERE organization_id = $1 AND account_id = $2",
        )
        .bind(organization_id)
        .bind(account_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_member(
        pool: &PgPool,
        organization_id: DbId,
        account_id: DbId,
    ) -> Result<Option<OrganizationMember>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM organization_members
             WHERE organization_id = $1 AND account_id = $2"
        );
        sqlx::query_as::<_, OrganizationMember>(&query)
            .bind(organization_id)
            .bind(account_id)
            .fetch_optional(pool)
            .await
    }

    /// Members of the organization, optionally only those holding `role_name`.
    pub async fn list_members(
        pool: &PgPool,
        organization_id: DbId,
        role_name: Option<&str>,
    ) -> Result<Vec<OrganizationMember>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM organization_members
             WHERE organization_id = $1 AND ($2::TEXT IS NULL OR role_name = $2)
             ORDER BY account_id ASC"
        );
        sqlx::query_as::<_, OrganizationMember>(&query)
            .bind(organization_id)
            .bind(role_name)
            .fetch_all(pool)
            .await
    }

    /// The role a member holds, if any.
    pub async fn get_member_role(
        pool: &PgPool,
        organization_id: DbId,
        account_id: DbId,
    ) -> Result<Option<OrganizationRole>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM organization_roles r
             JOIN organization_members m
               ON m.organization_id = r.organization_id AND m.role_name = r.name
             WHERE m.organization_id = $1 AND m.account_id = $2",
            ROLE_COLUMNS
                .split(", ")
                .map(|c| format!("r.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        sqlx::query_as::<_, OrganizationRole>(&query)
            .bind(organization_id)
            .bind(account_id)
            .fetch_optional(pool)
            .await
    }

    /// Permissions granted to a member, sorted. Empty without a role.
    pub async fn get_member_permissions(
        pool: &PgPool,
        organization_id: DbId,
        account_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        let role = Self::get_member_role(pool, organization_id, account_id).await?;
        Ok(role
            .map(|r| r.to_role().permissions.into_iter().collect())
            .unwrap_or_default())
    }

    /// Load the organization's roles and memberships into a [`RoleBook`].
    pub async fn load_role_book(pool: &PgPool, organization_id: DbId) -> Result<RoleBook, sqlx::Error> {
        let roles = Self::list_roles(pool, organization_id).await?;
        let members = Self::list_members(pool, organization_id, None).await?;
        Ok(RoleBook::from_parts(
            organization_id,
            roles.iter().map(OrganizationRole::to_role),
            members.iter().map(OrganizationMember::to_membership),
        ))
    }
}

/// Lock a role row for the caller's transaction, failing with `UnknownRole`.
async fn lock_role(conn: &mut PgConnection, organization_id: DbId, role_name: &str) -> DbResult<()> {
    let found: Option<DbId> = sqlx::query_scalar(
        "SELECT id FROM organization_roles
         WHERE organization_id = $1 AND name = $2
         FOR SHARE",
    )
    .bind(organization_id)
    .bind(role_name)
    .fetch_optional(conn)
    .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(CoreError::UnknownRole(role_name.to_string()).into()),
    }
}
