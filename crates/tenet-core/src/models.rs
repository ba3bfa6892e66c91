//! Domain models for Tenet.
//!
//! These are the core types shared across all crates.

pub mod api_key;
pub mod audit;
pub mod permission;
pub mod tenant;
pub mod tenant_group;
pub mod user;
pub mod verification;
