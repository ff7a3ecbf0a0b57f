//! Organization roles and memberships.
//!
//! A [`RoleBook`] holds one organization's roles and memberships. Roles are
//! stored by name; memberships are stored by member id and double as the
//! member-to-role reverse index. A second index maps each role to its members
//! so role listings do not scan every membership.
//!
//! A member holds at most one role per organization. Assigning a new role
//! replaces the previous one.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Role given to members added without an explicit role.
pub const ROLE_MEMBER: &str = "member";

/// Maximum role name length, matching the `organization_roles.name` column.
pub const MAX_ROLE_NAME_LEN: usize = 100;

/// A named role and the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: BTreeSet<String>,
}

/// A member's place in an organization.
///
/// `role_name` is `None` after the member's role has been removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: DbId,
    pub member_id: DbId,
    pub role_name: Option<String>,
}

/// Validate a role name.
pub fn validate_role_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Role name must not be empty".to_string()));
    }
    if trimmed.len() != name.len() {
        return Err(CoreError::Validation(format!(
            "Role name '{name}' must not have surrounding whitespace"
        )));
    }
    if name.chars().count() > MAX_ROLE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Role name must be at most {MAX_ROLE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Normalize a permission list into a set of trimmed, non-empty names.
pub fn normalize_permissions<I, S>(permissions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    permissions
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// In-memory role and membership book for one organization.
#[derive(Debug, Clone)]
pub struct RoleBook {
    organization_id: DbId,
    roles: BTreeMap<String, Role>,
    memberships: BTreeMap<DbId, Membership>,
    role_members: BTreeMap<String, BTreeSet<DbId>>,
}

impl RoleBook {
    pub fn new(organization_id: DbId) -> Self {
        Self {
            organization_id,
            roles: BTreeMap::new(),
            memberships: BTreeMap::new(),
            role_members: BTreeMap::new(),
        }
    }

    /// Rebuild a book from stored roles and memberships.
    ///
    /// Memberships pointing at a role that is not in `roles` are kept without
    /// a role.
    pub fn from_parts(
        organization_id: DbId,
        roles: impl IntoIterator<Item = Role>,
        memberships: impl IntoIterator<Item = Membership>,
    ) -> Self {
        let mut book = Self::new(organization_id);
        for role in roles {
            book.role_members.entry(role.name.clone()).or_default();
            book.roles.insert(role.name.clone(), role);
        }
        for mut membership in memberships {
            membership.organization_id = organization_id;
            if let Some(role) = membership.role_name.clone() {
                match book.role_members.get_mut(&role) {
                    Some(members) => {
                        members.insert(membership.member_id);
                    }
                    None => membership.role_name = None,
                }
            }
            book.memberships.insert(membership.member_id, membership);
        }
        book
    }

    pub fn organization_id(&self) -> DbId {
        self.organization_id
    }

    /// Insert or replace a role's permission list.
    pub fn add_role<I, S>(&mut self, role_name: &str, permissions: I) -> Result<&Role, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_role_name(role_name)?;
        self.role_members.entry(role_name.to_string()).or_default();
        let role = Role {
            name: role_name.to_string(),
            permissions: normalize_permissions(permissions),
        };
        self.roles.insert(role_name.to_string(), role);
        Ok(&self.roles[role_name])
    }

    /// Remove a role. Members holding it keep their membership without a role.
    ///
    /// Returns `false` if the role did not exist.
    pub fn remove_role(&mut self, role_name: &str) -> bool {
        if self.roles.remove(role_name).is_none() {
            return false;
        }
        for member_id in self.role_members.remove(role_name).unwrap_or_default() {
            if let Some(membership) = self.memberships.get_mut(&member_id) {
                membership.role_name = None;
            }
        }
        true
    }

    pub fn role(&self, role_name: &str) -> Option<&Role> {
        self.roles.get(role_name)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Give `member_id` the role `role_name`, creating the membership if needed.
    pub fn assign_role(&mut self, member_id: DbId, role_name: &str) -> Result<&Membership, CoreError> {
        if !self.roles.contains_key(role_name) {
            return Err(CoreError::UnknownRole(role_name.to_string()));
        }

        if let Some(previous) = self
            .memberships
            .get(&member_id)
            .and_then(|m| m.role_name.clone())
        {
            if let Some(members) = self.role_members.get_mut(&previous) {
                members.remove(&member_id);
            }
        }

        self.role_members
            .entry(role_name.to_string())
            .or_default()
            .insert(member_id);

        let organization_id = self.organization_id;
        let membership = self
            .memberships
            .entry(member_id)
            .or_insert_with(|| Membership {
                organization_id,
                member_id,
                role_name: None,
            });
        membership.role_name = Some(role_name.to_string());
        Ok(membership)
    }

    /// Add a member with the given role (the caller passes [`ROLE_MEMBER`]
    /// when none was chosen).
    pub fn add_member(&mut self, member_id: DbId, role_name: &str) -> Result<&Membership, CoreError> {
        self.assign_role(member_id, role_name)
    }

    /// Remove a membership. Returns `false` if the member had none.
    pub fn remove_member(&mut self, member_id: DbId) -> bool {
        let Some(membership) = self.memberships.remove(&member_id) else {
            return false;
        };
        if let Some(role) = membership.role_name {
            if let Some(members) = self.role_members.get_mut(&role) {
                members.remove(&member_id);
            }
        }
        true
    }

    pub fn membership(&self, member_id: DbId) -> Option<&Membership> {
        self.memberships.get(&member_id)
    }

    pub fn memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.values()
    }

    pub fn get_member_role(&self, member_id: DbId) -> Option<&Role> {
        self.memberships
            .get(&member_id)
            .and_then(|m| m.role_name.as_deref())
            .and_then(|name| self.roles.get(name))
    }

    /// Permissions granted to a member. Empty when the member has no role.
    pub fn get_member_permissions(&self, member_id: DbId) -> BTreeSet<String> {
        self.get_member_role(member_id)
            .map(|role| role.permissions.clone())
            .unwrap_or_default()
    }

    pub fn has_permission(&self, member_id: DbId, permission: &str) -> bool {
        self.get_member_role(member_id)
            .is_some_and(|role| role.permissions.contains(permission))
    }

    /// Member ids holding a role, ascending.
    pub fn members_with_role(&self, role_name: &str) -> Vec<DbId> {
        self.role_members
            .get(role_name)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Require a permission, failing with `Forbidden`.
    pub fn require_permission(&self, member_id: DbId, permission: &str) -> Result<(), CoreError> {
        if self.has_permission(member_id, permission) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Member {member_id} lacks permission '{permission}'"
            )))
        }
    }
}
