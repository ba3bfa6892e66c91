//! Core domain types and traits for the Tenet system.
//!
//! This crate is I/O free: it defines the error taxonomy, the identity-key
//! codec, declarative resource schemas, domain events, configuration value
//! objects, domain models and the repository traits the other crates
//! implement or consume.

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod models;
pub mod password;
pub mod repository;
pub mod schema;

pub use error::{TenetError, TenetResult};
pub use identity::IdentityKey;
