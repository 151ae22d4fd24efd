//! OAuth2 client-credentials token acquisition.
//!
//! The gateway authenticates itself to backends: a token is fetched from the
//! configured endpoint and attached to the forwarded request. Tokens are reused
//! until their advertised lifetime runs out.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{AuthError, Authenticator, Claims};
use crate::config::schema::OAuth2Config;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct OAuth2Authenticator {
    settings: OAuth2Config,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuth2Authenticator {
    pub fn new(settings: OAuth2Config) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AuthError::TokenFetch(err.to_string()))?;
        Ok(Self {
            settings,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &OAuth2Config {
        &self.settings
    }

    /// A valid access token, fetched or reused.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = self.fetch().await?;
        if response.expires_in > 0 {
            *cached = Some(CachedToken {
                access_token: response.access_token.clone(),
                expires_at: Instant::now() + Duration::from_secs(response.expires_in),
            });
        } else {
            *cached = None;
        }
        Ok(response.access_token)
    }

    async fn fetch(&self) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.settings.token_endpoint)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|err| AuthError::TokenFetch(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenFetch(format!("token endpoint returned {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::TokenFetch(err.to_string()))?;
        if token.access_token.is_empty() {
            return Err(AuthError::TokenFetch("response has no access_token".into()));
        }

        tracing::debug!(
            token_type = %token.token_type,
            expires_in = token.expires_in,
            "Fetched OAuth2 token"
        );
        Ok(token)
    }
}

impl Authenticator for OAuth2Authenticator {
    fn authenticate<'a>(
        &'a self,
        request: &'a mut Request<Body>,
    ) -> BoxFuture<'a, Result<Option<Claims>, AuthError>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| AuthError::TokenFetch("access token is not a valid header value".into()))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
            Ok(None)
        })
    }
}
