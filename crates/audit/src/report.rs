//! Aggregated audit results.

use std::collections::BTreeMap;

use cflows_core::types::DbId;
use cflows_core::workflow::{StationViolation, ViolationKind};
use serde::Serialize;

/// One organization's audited cars with at least one violation.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationReport {
    pub organization_id: DbId,
    pub slug: String,
    pub cars: Vec<CarReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarReport {
    pub car_id: DbId,
    pub label: String,
    pub violations: Vec<StationViolation>,
}

/// Totals across every audited organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub organizations: usize,
    pub mismatched_cars: usize,
    pub violations: usize,
    pub by_kind: BTreeMap<String, usize>,
}

impl AuditSummary {
    pub fn add(&mut self, report: &OrganizationReport) {
        self.organizations += 1;
        self.mismatched_cars += report.cars.len();
        for violation in report.cars.iter().flat_map(|car| &car.violations) {
            self.violations += 1;
            *self.by_kind.entry(kind_name(violation.kind).to_string()).or_default() += 1;
        }
    }

    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

fn kind_name(kind: ViolationKind) -> &'static str {
    match kind {
        ViolationKind::UnnormalizedKey => "unnormalized_key",
        ViolationKind::UnknownStation => "unknown_station",
        ViolationKind::StatusNotAllowed => "status_not_allowed",
        ViolationKind::BlankStatus => "blank_status",
    }
}
