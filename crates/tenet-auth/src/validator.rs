//! Request credential validation.
//!
//! One entry point takes whatever credentials a request presented and
//! either hands back the authenticated user with its admission ceiling or
//! the failure the request maps to. Failures come in tiers: credentials
//! that never prove an identity are `Unauthorized`, credentials that prove
//! one but violate a policy binding are `Forbidden`, and exhausted windows
//! are `RateLimited`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tenet_core::error::{TenetError, TenetResult};
use tenet_core::events::{DomainEvent, EventEmitter};
use tenet_core::identity::IdentityKey;
use tenet_core::models::user::User;
use tenet_core::repository::{ApiKeyRepository, RateCounterRepository, UserRepository};
use tracing::{info, warn};

use crate::api_key::{hash_key_secret, normalize_referer, parse_api_key};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::rate_limit::{RateLimiter, auth_key, private_key};
use crate::token;

/// Credentials extracted from one request.
#[derive(Debug, Default, Clone)]
pub struct RequestCredentials {
    /// Bearer token, without the scheme marker.
    pub bearer: Option<String>,
    /// Full API key string (`tenet_<key_id>_<secret>`).
    pub api_key: Option<String>,
    /// Address the request arrived from.
    pub client_ip: String,
    /// Referer the request presented, when any.
    pub referer: Option<String>,
}

/// A validated principal and the admission ceiling its requests run under.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// Requests per window this identity may spend.
    pub rate_limit: u32,
}

/// Validates request credentials against the user and API key stores.
///
/// The validator owns no HTTP concerns. Callers extract whatever the
/// request carried into [`RequestCredentials`] and map the returned
/// [`TenetError`] onto their transport.
pub struct CredentialValidator<U, K, R>
where
    U: UserRepository,
    K: ApiKeyRepository,
    R: RateCounterRepository,
{
    users: U,
    api_keys: K,
    limiter: RateLimiter<R>,
    config: AuthConfig,
    emitter: Arc<dyn EventEmitter>,
}

impl<U, K, R> CredentialValidator<U, K, R>
where
    U: UserRepository,
    K: ApiKeyRepository,
    R: RateCounterRepository,
{
    pub fn new(
        users: U,
        api_keys: K,
        counters: R,
        config: AuthConfig,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let limiter = RateLimiter::new(counters, Duration::from_secs(config.rate_window_secs));
        Self {
            users,
            api_keys,
            limiter,
            config,
            emitter,
        }
    }

    /// Validate one request's credentials.
    ///
    /// Bearer tokens win when both credentials are present. A credential
    /// whose method is disabled by configuration counts as absent. Requests
    /// with nothing usable burn an attempt against their client address
    /// before being refused.
    pub async fn validate(&self, credentials: RequestCredentials) -> TenetResult<AuthenticatedUser> {
        let bearer = credentials
            .bearer
            .as_deref()
            .filter(|_| self.config.bearer_enabled);
        let api_key = credentials
            .api_key
            .as_deref()
            .filter(|_| self.config.api_key_enabled);

        let (user, rate_limit) = match (bearer, api_key) {
            (Some(token), _) => self.validate_bearer(token).await?,
            (None, Some(full_key)) => self.validate_api_key(full_key, &credentials).await?,
            (None, None) => return self.reject_unauthenticated(&credentials.client_ip).await,
        };

        // Valid credentials still pass through per-identity admission.
        let allowed = self
            .limiter
            .check(&private_key(&user.id.decode()), rate_limit)
            .await?;
        if !allowed {
            warn!(user_id = %user.id.decode(), "identity exhausted its admission window");
            return Err(TenetError::RateLimited);
        }

        self.emitter
            .emit(DomainEvent::new("api.auth", json!({ "id": user.id.decode() })));

        Ok(AuthenticatedUser { user, rate_limit })
    }

    /// Count the anonymous attempt against its source address, then refuse.
    async fn reject_unauthenticated(&self, client_ip: &str) -> TenetResult<AuthenticatedUser> {
        let allowed = self
            .limiter
            .check(&auth_key(client_ip), self.config.auth_attempt_limit)
            .await?;
        if !allowed {
            warn!(client_ip, "unauthenticated attempts exhausted the window");
            return Err(TenetError::RateLimited);
        }
        info!(client_ip, "request presented no usable credentials");
        Err(AuthError::MissingCredentials.into())
    }

    async fn validate_bearer(&self, bearer: &str) -> TenetResult<(User, u32)> {
        // 1. Verify signature, expiry and issuer.
        let claims = token::decode_access_token(bearer, &self.config).map_err(|err| {
            info!(error = %err, "bearer token failed verification");
            TenetError::from(err)
        })?;

        // 2. The subject must be an identity key.
        let user_id = IdentityKey::encode(&claims.sub).map_err(|_| {
            info!(sub = %claims.sub, "bearer token subject is not an identity key");
            TenetError::from(AuthError::TokenInvalid(
                "subject is not an identity key".to_string(),
            ))
        })?;

        // 3. The subject must name a live user.
        let Some(user) = self.users.find(user_id).await? else {
            warn!(user_id = %claims.sub, "bearer token names an unknown user");
            return Err(AuthError::TokenRejected("unknown user".to_string()).into());
        };
        if !user.enabled {
            warn!(user_id = %claims.sub, "bearer token names a disabled user");
            return Err(AuthError::TokenRejected("user is disabled".to_string()).into());
        }

        Ok((user, self.config.user_rate_limit))
    }

    async fn validate_api_key(
        &self,
        full_key: &str,
        credentials: &RequestCredentials,
    ) -> TenetResult<(User, u32)> {
        // 1. Split the presented key into lookup id and secret.
        let Some((key_id, secret)) = parse_api_key(full_key) else {
            info!("presented API key does not parse");
            return Err(AuthError::ApiKeyInvalid.into());
        };

        // 2. Look the key up; an unknown id is indistinguishable from a bad
        //    secret on the outside.
        let key = match self.api_keys.get_by_key_id(key_id).await {
            Ok(key) => key,
            Err(TenetError::NotFound { .. }) => {
                info!(key_id, "unknown API key id");
                return Err(AuthError::ApiKeyInvalid.into());
            }
            Err(other) => return Err(other),
        };

        // 3. Prove possession of the secret.
        if hash_key_secret(secret) != key.secret_hash {
            info!(key_id, "API key secret mismatch");
            return Err(AuthError::ApiKeyInvalid.into());
        }

        // The key is authentic from here on; failures are policy rejections.

        // 4. The key itself must be live.
        if !key.enabled {
            warn!(key_id, "revoked API key presented");
            return Err(AuthError::ApiKeyRejected("key is disabled".to_string()).into());
        }

        // 5. Enforce referer and address bindings when the key carries them.
        if let Some(bound) = key.referer.as_deref() {
            let presented = normalize_referer(credentials.referer.as_deref());
            if presented != bound {
                warn!(key_id, referer = presented, "API key referer binding violated");
                return Err(AuthError::ApiKeyRejected("referer not allowed".to_string()).into());
            }
        }
        if let Some(bound) = key.ip_address.as_deref() {
            if credentials.client_ip != bound {
                warn!(
                    key_id,
                    client_ip = %credentials.client_ip,
                    "API key address binding violated"
                );
                return Err(AuthError::ApiKeyRejected("address not allowed".to_string()).into());
            }
        }

        // 6. The owning user must still exist and be enabled.
        let Some(user) = self.users.find(key.user_id).await? else {
            warn!(key_id, "API key owner no longer exists");
            return Err(AuthError::ApiKeyRejected("owner not found".to_string()).into());
        };
        if !user.enabled {
            warn!(key_id, "API key owner is disabled");
            return Err(AuthError::ApiKeyRejected("owner is disabled".to_string()).into());
        }

        // 7. A per-key ceiling overrides the configured default.
        let rate_limit = key.rate_limit.unwrap_or(self.config.user_rate_limit);
        Ok((user, rate_limit))
    }
}
