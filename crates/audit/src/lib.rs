//! Station state integrity audit.
//!
//! The binary walks every organization (or one, by slug), checks each car's
//! station state against the organization's station configurations and
//! reports every violation found.

pub mod config;
pub mod report;
