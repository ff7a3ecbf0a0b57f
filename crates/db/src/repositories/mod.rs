//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument. Organization-scoped repositories also take
//! a [`RequestContext`](cflows_core::context::RequestContext).

pub mod account_repo;
pub mod car_repo;
pub mod membership_repo;
pub mod organization_repo;
pub mod station_configuration_repo;
pub mod station_workflow_repo;

pub use account_repo::AccountRepo;
pub use car_repo::CarRepo;
pub use membership_repo::MembershipRepo;
pub use organization_repo::OrganizationRepo;
pub use station_configuration_repo::StationConfigurationRepo;
pub use station_workflow_repo::StationWorkflowRepo;
