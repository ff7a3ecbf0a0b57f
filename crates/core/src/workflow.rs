//! Station workflow engine.
//!
//! Owns the per-car station state map: one entry per station, holding the
//! current status, the time of the last transition, and an append-only
//! history of transitions. All functions are pure; callers wrap the
//! read-validate-write sequence in a single database transaction.
//!
//! Entries whose station has since been deactivated are frozen: they are kept
//! as history and skipped by status checks, but still have to be well formed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::station::{normalize_station_name, StationCatalog};
use crate::types::Timestamp;

/// One recorded status change at a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_status: String,
    pub to_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub timestamp: Timestamp,
}

/// A car's state at one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationState {
    pub status: String,
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub history: Vec<TransitionRecord>,
}

impl StationState {
    /// Fresh state at a station's default status.
    pub fn initial(default_status: &str) -> Self {
        Self {
            status: default_status.to_string(),
            timestamp: None,
            history: Vec::new(),
        }
    }

    pub fn last_transition(&self) -> Option<&TransitionRecord> {
        self.history.last()
    }
}

/// Mapping from lower-cased station name to that station's state.
///
/// Persisted as a JSON object with the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationStateMap(BTreeMap<String, StationState>);

impl StationStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, station: &str) -> Option<&StationState> {
        self.0.get(&normalize_station_name(station))
    }

    /// Current status at a station, if the car has state for it.
    pub fn status_of(&self, station: &str) -> Option<&str> {
        self.get(station).map(|s| s.status.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StationState)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, StationState)> for StationStateMap {
    fn from_iter<I: IntoIterator<Item = (String, StationState)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What is wrong with one station state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The key is not trimmed and lower-cased.
    UnnormalizedKey,
    /// No configuration with this name exists for the organization.
    UnknownStation,
    /// The status is not in the active station's allowed set.
    StatusNotAllowed,
    /// The status is empty.
    BlankStatus,
}

/// A single offending station/status pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationViolation {
    pub station: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub kind: ViolationKind,
}

impl fmt::Display for StationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.as_deref().unwrap_or("");
        match self.kind {
            ViolationKind::UnnormalizedKey => {
                write!(f, "station key '{}' is not normalized", self.station)
            }
            ViolationKind::UnknownStation => {
                write!(f, "station '{}' is not configured", self.station)
            }
            ViolationKind::StatusNotAllowed => write!(
                f,
                "status '{status}' is not allowed for station '{}'",
                self.station
            ),
            ViolationKind::BlankStatus => {
                write!(f, "station '{}' has a blank status", self.station)
            }
        }
    }
}

/// Seed one entry per active station that the car has no state for yet.
///
/// Existing entries are left untouched, so running it again never overwrites
/// progress. Returns the number of entries added.
pub fn initialize(state: &mut StationStateMap, catalog: &StationCatalog) -> usize {
    let mut added = 0;
    for def in catalog.active() {
        let key = def.key();
        if !state.0.contains_key(&key) {
            state.0.insert(key, StationState::initial(&def.default_status));
            added += 1;
        }
    }
    added
}

/// Apply a status change at one station.
///
/// Returns the new map; `state` itself is never modified, so a rejected
/// transition leaves nothing behind. The full map is re-validated before the
/// new map is returned.
pub fn transition(
    state: &StationStateMap,
    catalog: &StationCatalog,
    station_name: &str,
    new_status: &str,
    actor: Option<&str>,
    timestamp: Timestamp,
) -> Result<StationStateMap, CoreError> {
    let key = normalize_station_name(station_name);

    let def = catalog
        .get_active(&key)
        .ok_or_else(|| CoreError::UnknownStation(key.clone()))?;

    if !def.allows(new_status) {
        return Err(CoreError::InvalidStatus {
            station: key,
            status: new_status.to_string(),
        });
    }

    let mut next = state.clone();
    let entry = next
        .0
        .entry(key)
        .or_insert_with(|| StationState::initial(&def.default_status));

    entry.history.push(TransitionRecord {
        from_status: entry.status.clone(),
        to_status: new_status.to_string(),
        actor: actor.map(str::to_string),
        timestamp,
    });
    entry.status = new_status.to_string();
    entry.timestamp = Some(timestamp);

    validate(&next, catalog)?;
    Ok(next)
}

/// Check every entry against the catalog, collecting all violations.
pub fn collect_violations(
    state: &StationStateMap,
    catalog: &StationCatalog,
) -> Vec<StationViolation> {
    let mut violations = Vec::new();

    for (key, entry) in state.iter() {
        let status = Some(entry.status.clone());

        if *key != normalize_station_name(key) {
            violations.push(StationViolation {
                station: key.clone(),
                status: status.clone(),
                kind: ViolationKind::UnnormalizedKey,
            });
        }

        if entry.status.trim().is_empty() {
            violations.push(StationViolation {
                station: key.clone(),
                status: None,
                kind: ViolationKind::BlankStatus,
            });
            continue;
        }

        match catalog.get(key) {
            None => violations.push(StationViolation {
                station: key.clone(),
                status,
                kind: ViolationKind::UnknownStation,
            }),
            Some(def) if def.is_active && !def.allows(&entry.status) => {
                violations.push(StationViolation {
                    station: key.clone(),
                    status,
                    kind: ViolationKind::StatusNotAllowed,
                })
            }
            // Active and allowed, or frozen.
            Some(_) => {}
        }
    }

    violations
}

/// Validate the full map, failing with every violation at once.
pub fn validate(state: &StationStateMap, catalog: &StationCatalog) -> Result<(), CoreError> {
    let violations = collect_violations(state, catalog);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CoreError::ConfigMismatch(violations))
    }
}
