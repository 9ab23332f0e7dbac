//! Request-level identity and admin checks.
//!
//! Every admin route calls [`require_admin`] itself; no decision is cached
//! between requests.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use profitboard_shared::auth::{authorize_admin, AdminDecision, GrantSource};
use profitboard_shared::constants::ADMIN_PASSCODE_HEADER;

use crate::api::AppState;
use crate::error::ServerError;
use crate::identity::{bearer_token, Identity};

/// Who passed the admin gate and how.
#[derive(Debug, Clone)]
pub struct AdminContext {
    /// `None` when access came from the passcode alone.
    pub identity: Option<Identity>,
    pub source: GrantSource,
}

pub async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    state.identity.resolve(bearer_token(headers)).await
}

pub async fn require_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Identity, ServerError> {
    resolve_identity(state, headers)
        .await
        .ok_or(ServerError::Unauthorized)
}

pub async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AdminContext, ServerError> {
    let identity = resolve_identity(state, headers).await;

    let role = match &identity {
        Some(identity) => state
            .db
            .lock()
            .await
            .find_profile(identity.id)?
            .map(|profile| profile.role),
        None => None,
    };

    let override_ok = passcode_matches(headers, state.config.admin_passcode.as_deref());

    match authorize_admin(identity.is_some(), role, override_ok) {
        AdminDecision::Granted(source) => {
            if source == GrantSource::Override {
                tracing::warn!(
                    user = ?identity.as_ref().map(|i| i.id),
                    "admin access granted by override passcode"
                );
            }
            Ok(AdminContext { identity, source })
        }
        AdminDecision::Unauthorized => Err(ServerError::Unauthorized),
        AdminDecision::Forbidden => Err(ServerError::Forbidden),
    }
}

/// Constant-time comparison of the passcode header against the configured
/// secret. Never matches when no secret is configured.
fn passcode_matches(headers: &HeaderMap, configured: Option<&str>) -> bool {
    let Some(expected) = configured else {
        return false;
    };
    let Some(provided) = headers
        .get(ADMIN_PASSCODE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    provided.len() == expected.len() && provided.ct_eq(expected).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_passcode(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(ADMIN_PASSCODE_HEADER, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_passcode_matches_exactly() {
        assert!(passcode_matches(&with_passcode("s3cret"), Some("s3cret")));
        assert!(!passcode_matches(&with_passcode("s3cre"), Some("s3cret")));
        assert!(!passcode_matches(&with_passcode("S3CRET"), Some("s3cret")));
        assert!(!passcode_matches(&HeaderMap::new(), Some("s3cret")));
    }

    #[test]
    fn test_passcode_disabled_when_unconfigured() {
        assert!(!passcode_matches(&with_passcode("admin"), None));
        assert!(!passcode_matches(&with_passcode(""), None));
    }
}
