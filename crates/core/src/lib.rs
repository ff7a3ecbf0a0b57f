//! Domain logic for organization-scoped vehicle workflows.
//!
//! Pure code only: no database or I/O. The persistence crate loads data,
//! calls into these modules, and writes the results back inside a
//! transaction.

pub mod context;
pub mod error;
pub mod membership;
pub mod organization;
pub mod station;
pub mod types;
pub mod vehicle;
pub mod workflow;
