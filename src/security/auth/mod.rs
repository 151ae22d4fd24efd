//! Request authentication.
//!
//! The middleware re-reads `[auth]` for every request and dispatches to the
//! configured scheme. JWT verifies an inbound bearer token and attaches its
//! claims; OAuth2 acquires a client-credentials token for the backend.

pub mod jwt;
pub mod oauth2;

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::schema::{AuthConfig, OAuth2Config};
use crate::config::ConfigHandle;
use crate::error::GatewayError;
use crate::http::pipeline::{Middleware, Next};

pub use jwt::JwtAuthenticator;
pub use oauth2::OAuth2Authenticator;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token fetch failed: {0}")]
    TokenFetch(String),
}

/// Verified token claims, attached to the request as an extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(pub serde_json::Map<String, serde_json::Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(|v| v.as_str())
    }
}

/// An authentication scheme.
///
/// `Ok(Some(claims))` admits the request with verified claims, `Ok(None)` admits
/// it without claims, and an error denies it.
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        request: &'a mut Request<Body>,
    ) -> BoxFuture<'a, Result<Option<Claims>, AuthError>>;
}

pub struct AuthMiddleware {
    config: ConfigHandle,
    jwt: Mutex<Option<(String, Arc<JwtAuthenticator>)>>,
    oauth2: Mutex<Option<(OAuth2Config, Arc<OAuth2Authenticator>)>>,
}

impl AuthMiddleware {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            jwt: Mutex::new(None),
            oauth2: Mutex::new(None),
        }
    }

    fn jwt(&self, secret: &str) -> Arc<JwtAuthenticator> {
        let mut slot = self.jwt.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some((current, jwt)) if current == secret => Arc::clone(jwt),
            _ => {
                let jwt = Arc::new(JwtAuthenticator::new(secret));
                *slot = Some((secret.to_string(), Arc::clone(&jwt)));
                jwt
            }
        }
    }

    fn oauth2(&self, settings: &OAuth2Config) -> Result<Arc<OAuth2Authenticator>, AuthError> {
        let mut slot = self.oauth2.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some((current, oauth2)) if current == settings => Ok(Arc::clone(oauth2)),
            _ => {
                let oauth2 = Arc::new(OAuth2Authenticator::new(settings.clone())?);
                *slot = Some((settings.clone(), Arc::clone(&oauth2)));
                Ok(oauth2)
            }
        }
    }

    fn authenticator(
        &self,
        auth_type: &str,
        settings: &AuthConfig,
    ) -> Result<Option<Arc<dyn Authenticator>>, AuthError> {
        match auth_type {
            "jwt" => Ok(Some(self.jwt(&settings.jwt.secret_key))),
            "oauth2" if settings.oauth2.enabled => {
                Ok(Some(self.oauth2(&settings.oauth2)?))
            }
            "oauth2" | "none" => Ok(None),
            other => {
                tracing::warn!(auth_type = %other, "Unknown auth type, skipping authentication");
                Ok(None)
            }
        }
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn call(self: Arc<Self>, mut request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let generation = self.config.for_request(&request);
            let auth = &generation.config.auth;
            if !auth.enabled {
                return next.run(request).await;
            }

            let auth_type = auth.auth_type.to_ascii_lowercase();
            let outcome = match self.authenticator(&auth_type, auth) {
                Ok(None) => return next.run(request).await,
                Ok(Some(authenticator)) => authenticator.authenticate(&mut request).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(claims) => {
                    if let Some(claims) = claims {
                        request.extensions_mut().insert(claims);
                    }
                    next.run(request).await
                }
                Err(err) => {
                    tracing::warn!(
                        path = %request.uri().path(),
                        auth_type = %auth_type,
                        error = %err,
                        "Authentication failed"
                    );
                    GatewayError::from(err).into_response()
                }
            }
        })
    }
}
