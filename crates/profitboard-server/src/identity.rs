//! Bearer-token identity resolution.
//!
//! Token validation is delegated to the external identity provider. A
//! missing, malformed, expired or unverifiable token resolves to `None`;
//! nothing here ever fails a request on its own.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Translate a bearer token into an identity. Never errors.
    async fn resolve(&self, bearer: Option<&str>) -> Option<Identity>;
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. A bare token without a scheme
/// is accepted as-is.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Resolves against `GET {base_url}/auth/v1/user`.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, bearer: Option<&str>) -> Option<Identity> {
        let token = bearer?;
        let url = format!("{}/auth/v1/user", self.base_url);

        let mut request = self.client.get(&url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "identity provider unreachable");
                return None;
            }
        };

        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "bearer token rejected");
            return None;
        }

        match resp.json::<Identity>().await {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(error = %e, "unexpected identity provider response");
                None
            }
        }
    }
}

/// Used when no identity provider is configured: nobody is signed in.
pub struct DisabledIdentityProvider;

#[async_trait]
impl IdentityProvider for DisabledIdentityProvider {
    async fn resolve(&self, _bearer: Option<&str>) -> Option<Identity> {
        None
    }
}
