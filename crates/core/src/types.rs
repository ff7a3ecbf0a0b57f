//! Shared scalar types.

/// Row id of organizations, accounts, cars and station configurations
/// (PostgreSQL `BIGSERIAL`).
pub type DbId = i64;

/// Transition and row timestamps, always UTC. Serialized as RFC 3339.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
