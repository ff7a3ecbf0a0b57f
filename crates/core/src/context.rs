//! Explicit request context.
//!
//! Every organization-scoped operation receives the acting account and the
//! organization it acts in as a parameter instead of reading ambient state.

use crate::types::DbId;

/// Who performs an operation. Recorded as the `actor` of station transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// A signed-in account.
    Account { id: DbId, email: String },
    /// Automated writes (imports, migrations, the audit tool).
    System,
}

impl Actor {
    /// Label stored in transition history.
    pub fn label(&self) -> String {
        match self {
            Actor::Account { email, .. } => email.clone(),
            Actor::System => "system".to_string(),
        }
    }

    pub fn account_id(&self) -> Option<DbId> {
        match self {
            Actor::Account { id, .. } => Some(*id),
            Actor::System => None,
        }
    }
}

/// The organization and actor a request runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub organization_id: DbId,
    pub actor: Actor,
}

impl RequestContext {
    pub fn new(organization_id: DbId, actor: Actor) -> Self {
        Self {
            organization_id,
            actor,
        }
    }

    /// Context for automated work inside one organization.
    pub fn system(organization_id: DbId) -> Self {
        Self::new(organization_id, Actor::System)
    }
}
