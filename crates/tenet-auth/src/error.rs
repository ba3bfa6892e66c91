//! Authentication error types.

use tenet_core::error::TenetError;
use thiserror::Error;

/// Errors raised while validating request credentials.
///
/// The split between `*Invalid` and `*Rejected` variants is deliberate:
/// invalid means the credential never proved who it belongs to, rejected
/// means it did but a policy forbids its use. The conversion below maps
/// the former tier to 401 and the latter to 403.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no valid credentials presented")]
    MissingCredentials,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token rejected: {0}")]
    TokenRejected(String),

    #[error("invalid API key")]
    ApiKeyInvalid,

    #[error("API key rejected: {0}")]
    ApiKeyRejected(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for TenetError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::ApiKeyInvalid => TenetError::Unauthorized {
                reason: err.to_string(),
            },
            AuthError::TokenRejected(_) | AuthError::ApiKeyRejected(_) => TenetError::Forbidden {
                reason: err.to_string(),
            },
            AuthError::Crypto(message) => TenetError::Unexpected(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tiers_map_to_the_right_status() {
        let unauthorized: TenetError = AuthError::TokenExpired.into();
        assert_eq!(unauthorized.status(), 401);

        let forbidden: TenetError = AuthError::ApiKeyRejected("key is disabled".into()).into();
        assert_eq!(forbidden.status(), 403);

        let unexpected: TenetError = AuthError::Crypto("bad PEM".into()).into();
        assert_eq!(unexpected.status(), 500);
    }
}
