//! Bearer token extraction and the validated [`AuthInfo`] model.
//!
//! Provides [`extract_bearer_token`] for pulling a token out of an
//! `Authorization` header, the [`TokenValidator`] trait for pluggable token
//! validation, and [`AuthInfo`], the per-request identity handed to
//! protected handlers.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;

use super::introspection::{ActiveToken, IntrospectionError};

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively and the token is trimmed.
/// Returns `None` when the header is absent, uses another scheme, or carries
/// an empty token.
///
/// ```rust
/// use mcp_resource_gate::oauth::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token(Some("bearer abc123 ")), Some("abc123"));
/// assert_eq!(extract_bearer_token(Some("Basic dXNlcg==")), None);
/// assert_eq!(extract_bearer_token(None), None);
/// ```
pub fn extract_bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, rest) = header?.trim_start().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

/// Validated identity behind a bearer token.
///
/// Only built from an [`ActiveToken`], i.e. after the authorization server
/// confirmed the token is active. Fields are read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthInfo {
    token: String,
    client_id: String,
    scopes: BTreeSet<String>,
    subject: String,
    expires_at: Option<u64>,
}

impl AuthInfo {
    /// Build auth info from the token as presented and its introspection data.
    pub(crate) fn from_active(token: impl Into<String>, active: ActiveToken) -> Self {
        Self {
            token: token.into(),
            scopes: parse_scopes(&active.scope),
            client_id: active.client_id,
            subject: active.sub,
            expires_at: active.exp,
        }
    }

    /// The bearer token exactly as presented by the client.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The OAuth client that obtained the token.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Granted scopes.
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// The resource owner (user id).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Absolute expiry as Unix seconds, when the authorization server sent one.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Check if the token has a specific scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Check if the token has expired based on the current time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                now > exp
            }
            None => false,
        }
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Split a space-delimited scope string. An empty string yields no scopes.
pub fn parse_scopes(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(String::from).collect()
}

/// Handlers behind [`OAuthLayer`](super::OAuthLayer) can take `AuthInfo`
/// as an argument.
///
/// Rejects with 500 if the gate is not installed on the route, since that is
/// a wiring mistake rather than a client error.
impl<S> FromRequestParts<S> for AuthInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthInfo>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "authorization gate is not installed on this route",
        ))
    }
}

/// Trait for validating OAuth access tokens.
///
/// [`IntrospectionClient`](super::IntrospectionClient) is the production
/// implementation. Implement this trait to plug in another source of truth
/// (a local token store, a test double).
///
/// # Example
///
/// ```rust
/// use mcp_resource_gate::oauth::{ActiveToken, IntrospectionError, TokenValidator};
///
/// #[derive(Clone)]
/// struct FixedToken;
///
/// impl TokenValidator for FixedToken {
///     async fn validate_token(&self, token: &str) -> Result<ActiveToken, IntrospectionError> {
///         if token == "letmein" {
///             Ok(ActiveToken::new("cli", "42", "entries:read"))
///         } else {
///             Err(IntrospectionError::Inactive)
///         }
///     }
/// }
/// ```
pub trait TokenValidator: Clone + Send + Sync + 'static {
    /// Validate an access token and return its introspection data.
    ///
    /// Returns [`IntrospectionError::Inactive`] for tokens that are simply not
    /// valid; every other error means the validator itself misbehaved.
    fn validate_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ActiveToken, IntrospectionError>> + Send;
}
