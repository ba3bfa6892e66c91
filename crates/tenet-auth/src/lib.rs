//! Credential validation and admission control for the Tenet API.
//!
//! This crate decides who a request is and whether it may proceed:
//!
//! - [`validator`] resolves bearer tokens and API keys into an
//!   authenticated user, with the 401/403 tier split baked into its errors
//! - [`rate_limit`] does fixed-window admission over a counter store
//! - [`permission`] answers action checks against stored grants
//! - [`token`] issues and verifies the EdDSA access tokens the validator
//!   consumes
//!
//! Everything here talks to storage through the `tenet-core` repository
//! traits, so any backend implementing those traits plugs in.

pub mod api_key;
pub mod config;
pub mod error;
pub mod permission;
pub mod rate_limit;
pub mod token;
pub mod validator;

pub use config::AuthConfig;
pub use error::AuthError;
pub use permission::PermissionEvaluator;
pub use rate_limit::RateLimiter;
pub use token::{AccessTokenClaims, decode_access_token, issue_access_token};
pub use validator::{AuthenticatedUser, CredentialValidator, RequestCredentials};
