use crate::types::DbId;
use crate::workflow::StationViolation;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A station configuration is malformed (bad status set or default).
    #[error("Invalid station configuration: {0}")]
    InvalidConfig(String),

    /// A uniqueness constraint was violated.
    #[error("Duplicate {entity}: '{name}' already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// The station is not configured (or not active) for the organization.
    #[error("Station '{0}' is not configured for this organization")]
    UnknownStation(String),

    #[error("Status '{status}' is not allowed for station '{station}'")]
    InvalidStatus { station: String, status: String },

    /// The car's full station state failed validation. Carries every violation.
    #[error("Station state does not match configuration: {}", format_violations(.0))]
    ConfigMismatch(Vec<StationViolation>),

    #[error("Role '{0}' is not defined for this organization")]
    UnknownRole(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code for the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::InvalidConfig(_) => "INVALID_CONFIG",
            CoreError::DuplicateName { .. } => "DUPLICATE_NAME",
            CoreError::UnknownStation(_) => "UNKNOWN_STATION",
            CoreError::InvalidStatus { .. } => "INVALID_STATUS",
            CoreError::ConfigMismatch(_) => "CONFIG_MISMATCH",
            CoreError::UnknownRole(_) => "UNKNOWN_ROLE",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error should be shown to the user as a validation failure
    /// rather than logged as a server fault.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            CoreError::NotFound { .. } | CoreError::Forbidden(_) | CoreError::Internal(_)
        )
    }
}

fn format_violations(violations: &[StationViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ViolationKind;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CoreError::UnknownStation("wash".into()).code(),
            "UNKNOWN_STATION"
        );
        assert_eq!(CoreError::UnknownRole("x".into()).code(), "UNKNOWN_ROLE");
        assert_eq!(CoreError::ConfigMismatch(vec![]).code(), "CONFIG_MISMATCH");
    }

    #[test]
    fn taxonomy_members_are_validation_errors() {
        assert!(CoreError::InvalidConfig("bad".into()).is_validation());
        assert!(CoreError::InvalidStatus {
            station: "inspection".into(),
            status: "scrapped".into(),
        }
        .is_validation());
        assert!(!CoreError::Internal("boom".into()).is_validation());
        assert!(!CoreError::NotFound { entity: "Car", id: 1 }.is_validation());
    }

    #[test]
    fn config_mismatch_lists_every_violation() {
        let err = CoreError::ConfigMismatch(vec![
            StationViolation {
                station: "wash".into(),
                status: Some("dirty".into()),
                kind: ViolationKind::UnknownStation,
            },
            StationViolation {
                station: "inspection".into(),
                status: Some("scrapped".into()),
                kind: ViolationKind::StatusNotAllowed,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("wash"));
        assert!(msg.contains("scrapped"));
    }
}
