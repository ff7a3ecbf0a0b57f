//! Station configuration rules and the per-organization catalog snapshot.
//!
//! A station is a named stage of an organization's vehicle workflow. Each
//! station allows an ordered set of statuses and starts cars at a default
//! status. Station names are compared lower-cased.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum station name length, matching the `station_configurations.name` column.
pub const MAX_STATION_NAME_LEN: usize = 100;

/// Status used when an admin does not pick a default.
pub const DEFAULT_STATUS: &str = "pending";

/// The workflow-relevant part of a station configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationDefinition {
    pub name: String,
    pub display_order: i32,
    pub is_active: bool,
    pub default_status: String,
    pub allowed_statuses: Vec<String>,
    pub required: bool,
}

impl StationDefinition {
    /// Lower-cased key used in car station state maps.
    pub fn key(&self) -> String {
        normalize_station_name(&self.name)
    }

    pub fn allows(&self, status: &str) -> bool {
        self.allowed_statuses.iter().any(|s| s == status)
    }
}

/// Normalize a station name for lookups and state-map keys.
pub fn normalize_station_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validate a station name.
pub fn validate_station_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidConfig(
            "Station name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_STATION_NAME_LEN {
        return Err(CoreError::InvalidConfig(format!(
            "Station name must be at most {MAX_STATION_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate an allowed-status list and its default.
///
/// The list must be non-empty, hold no blank or duplicate entries, and
/// contain the default status.
pub fn validate_statuses(allowed_statuses: &[String], default_status: &str) -> Result<(), CoreError> {
    if allowed_statuses.is_empty() {
        return Err(CoreError::InvalidConfig(
            "Allowed statuses must be a non-empty list of status strings".to_string(),
        ));
    }

    for (i, status) in allowed_statuses.iter().enumerate() {
        if status.trim().is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "Allowed status at position {i} is blank"
            )));
        }
        if allowed_statuses[..i].contains(status) {
            return Err(CoreError::InvalidConfig(format!(
                "Allowed status '{status}' is listed more than once"
            )));
        }
    }

    if !allowed_statuses.iter().any(|s| s == default_status) {
        return Err(CoreError::InvalidConfig(format!(
            "Default status '{default_status}' must be one of the allowed statuses: {}",
            allowed_statuses.join(", ")
        )));
    }

    Ok(())
}

/// Validate a complete definition.
pub fn validate_definition(def: &StationDefinition) -> Result<(), CoreError> {
    validate_station_name(&def.name)?;
    validate_statuses(&def.allowed_statuses, &def.default_status)
}

/// Listing order for stations: display order, then name.
fn display_cmp(a: &StationDefinition, b: &StationDefinition) -> Ordering {
    a.display_order
        .cmp(&b.display_order)
        .then_with(|| a.key().cmp(&b.key()))
}

/// A consistent snapshot of one organization's station configurations,
/// active and inactive, keyed by normalized name.
///
/// The workflow engine validates against a single catalog per operation so a
/// concurrent admin edit can never be observed half-applied.
#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: BTreeMap<String, StationDefinition>,
}

impl StationCatalog {
    pub fn new(definitions: impl IntoIterator<Item = StationDefinition>) -> Self {
        let stations = definitions
            .into_iter()
            .map(|def| (def.key(), def))
            .collect();
        Self { stations }
    }

    /// Look up a station by (un-normalized) name, active or not.
    pub fn get(&self, name: &str) -> Option<&StationDefinition> {
        self.stations.get(&normalize_station_name(name))
    }

    /// Look up an active station by name.
    pub fn get_active(&self, name: &str) -> Option<&StationDefinition> {
        self.get(name).filter(|def| def.is_active)
    }

    /// Active stations in display order.
    pub fn active(&self) -> Vec<&StationDefinition> {
        let mut active: Vec<&StationDefinition> =
            self.stations.values().filter(|d| d.is_active).collect();
        active.sort_by(|a, b| display_cmp(a, b));
        active
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    pub(crate) fn station(name: &str, order: i32, statuses: &[&str], default: &str) -> StationDefinition {
        StationDefinition {
            name: name.to_string(),
            display_order: order,
            is_active: true,
            default_status: default.to_string(),
            allowed_statuses: statuses.iter().map(|s| s.to_string()).collect(),
            required: false,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_statuses_accepted() {
        assert!(validate_statuses(&strings(&["pending", "passed", "failed"]), "pending").is_ok());
    }

    #[test]
    fn default_must_be_allowed() {
        let result = validate_statuses(&strings(&["pending", "passed"]), "scrapped");
        assert_matches!(result, Err(CoreError::InvalidConfig(msg)) if msg.contains("scrapped"));
    }

    #[test]
    fn empty_status_list_rejected() {
        assert_matches!(validate_statuses(&[], "pending"), Err(CoreError::InvalidConfig(_)));
    }

    #[test]
    fn blank_and_duplicate_statuses_rejected() {
        assert!(validate_statuses(&strings(&["pending", " "]), "pending").is_err());
        assert!(validate_statuses(&strings(&["pending", "pending"]), "pending").is_err());
    }

    #[test]
    fn station_name_rules() {
        assert!(validate_station_name("Inspection").is_ok());
        assert!(validate_station_name("").is_err());
        assert!(validate_station_name(&"x".repeat(MAX_STATION_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn names_normalize_to_lowercase() {
        assert_eq!(normalize_station_name(" Ready For Sale "), "ready for sale");
    }

    #[test]
    fn display_sort_by_order_then_name() {
        let catalog = StationCatalog::new(vec![
            station("Wash", 2, &["dirty"], "dirty"),
            station("inspection", 1, &["pending"], "pending"),
            station("Intake", 1, &["new"], "new"),
        ]);
        let names: Vec<&str> = catalog.active().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["inspection", "Intake", "Wash"]);
    }

    #[test]
    fn catalog_lookup_is_case_insensitive() {
        let mut retired = station("Wash", 3, &["dirty", "clean"], "dirty");
        retired.is_active = false;
        let catalog = StationCatalog::new(vec![
            station("Inspection", 1, &["pending", "passed"], "pending"),
            retired,
        ]);

        assert!(catalog.get("INSPECTION").is_some());
        assert!(catalog.get("wash").is_some());
        assert!(catalog.get_active("wash").is_none());
        assert_eq!(catalog.active().len(), 1);
        assert_eq!(catalog.len(), 2);
    }
}
