//! Authentication configuration.

/// Configuration for credential validation and admission control.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key used to sign access tokens.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key used to verify access tokens.
    pub jwt_public_key_pem: String,
    /// Value of the `iss` claim; tokens carrying any other issuer are rejected.
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Whether bearer tokens are an accepted credential.
    pub bearer_enabled: bool,
    /// Whether API keys are an accepted credential.
    pub api_key_enabled: bool,
    /// Attempts per window an unauthenticated client address may spend.
    pub auth_attempt_limit: u32,
    /// Requests per window an authenticated identity may spend, unless an
    /// API key overrides it.
    pub user_rate_limit: u32,
    /// Fixed rate-limit window length in seconds (default: 60).
    pub rate_window_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "tenet".to_string(),
            access_token_lifetime_secs: 900,
            bearer_enabled: true,
            api_key_enabled: true,
            auth_attempt_limit: 10,
            user_rate_limit: 60,
            rate_window_secs: 60,
        }
    }
}
