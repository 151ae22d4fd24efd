//! HMAC-signed bearer token verification.

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{header, Request},
};
use futures_util::future::BoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::{AuthError, Authenticator, Claims};

pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Verifier for tokens signed with `secret` (HS256, HS384 or HS512).
    ///
    /// No claim is mandatory; `exp` and `nbf` are checked when present.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.validate_aud = false;
        validation.validate_nbf = true;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<serde_json::Map<String, serde_json::Value>>(token, &self.key, &self.validation)
            .map(|data| Claims(data.claims))
            .map_err(|err| AuthError::InvalidToken(err.to_string()))
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate<'a>(
        &'a self,
        request: &'a mut Request<Body>,
    ) -> BoxFuture<'a, Result<Option<Claims>, AuthError>> {
        Box::pin(async move {
            let value = request
                .headers()
                .get(header::AUTHORIZATION)
                .ok_or(AuthError::MissingCredentials)?
                .to_str()
                .map_err(|_| AuthError::InvalidToken("non-ascii authorization header".into()))?;

            let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
            if token.is_empty() {
                return Err(AuthError::MissingCredentials);
            }

            self.verify(token).map(Some)
        })
    }
}
