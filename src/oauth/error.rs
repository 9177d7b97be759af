//! Gate failures and their HTTP responses.
//!
//! Each [`OAuthError`] variant maps to a status code, an optional
//! [`Challenge`] for the `WWW-Authenticate` header, and a JSON-RPC error body
//! MCP clients can display.

use std::fmt;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use url::Url;

use super::challenge::{BearerError, Challenge, INVALID_TOKEN_DESCRIPTION};
use super::introspection::IntrospectionError;
use super::scope::ScopeRequirement;

/// JSON-RPC error code used for authorization failures.
pub const UNAUTHORIZED_ERROR_CODE: i32 = -32001;

/// OAuth 2.1 authentication/authorization error.
#[derive(Debug, Clone)]
pub enum OAuthError {
    /// No `Authorization` header was sent.
    /// Returns HTTP 401 with a challenge that carries no `error`.
    MissingToken,

    /// A credential was sent but is unusable (wrong scheme, inactive,
    /// expired, revoked). Returns HTTP 401 with `error="invalid_token"`.
    InvalidToken {
        /// Internal reason, logged and put in the body, never in the header.
        reason: String,
    },

    /// The token satisfies none of the accepted scope combinations.
    /// Returns HTTP 403 with `error="insufficient_scope"`.
    InsufficientScope {
        /// The combinations that would have been accepted.
        requirement: ScopeRequirement,
    },

    /// The authorization server failed and the gate is configured to say so.
    /// Returns HTTP 502 with no challenge.
    Upstream(IntrospectionError),
}

impl OAuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            OAuthError::MissingToken | OAuthError::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            OAuthError::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            OAuthError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short machine-friendly label used in logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            OAuthError::MissingToken => "missing_token",
            OAuthError::InvalidToken { .. } => "invalid_token",
            OAuthError::InsufficientScope { .. } => "insufficient_scope",
            OAuthError::Upstream(_) => "upstream_failure",
        }
    }

    /// Build the `WWW-Authenticate` challenge for this error.
    ///
    /// `resource_metadata` is attached to 401 challenges only. Returns `None`
    /// for upstream failures, which are not the client's to fix.
    pub fn challenge(&self, realm: &str, resource_metadata: Option<Url>) -> Option<Challenge> {
        let challenge = match self {
            OAuthError::MissingToken => Challenge::bearer(realm),
            OAuthError::InvalidToken { .. } => Challenge::bearer(realm)
                .error(BearerError::InvalidToken)
                .error_description(INVALID_TOKEN_DESCRIPTION),
            OAuthError::InsufficientScope { requirement } => {
                return Some(Challenge::insufficient_scope(realm, requirement));
            }
            OAuthError::Upstream(_) => return None,
        };

        Some(match resource_metadata {
            Some(url) => challenge.resource_metadata(url),
            None => challenge,
        })
    }

    /// Build the HTTP error response, with the given challenge if any.
    pub fn into_response_with(self, challenge: Option<Challenge>) -> Response {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "error": {
                "code": UNAUTHORIZED_ERROR_CODE,
                "message": self.to_string()
            },
            "id": null
        });

        let mut response = (self.status_code(), axum::Json(body)).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge.to_header_value());
        }
        response
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::MissingToken => write!(f, "missing bearer token"),
            OAuthError::InvalidToken { reason } => write!(f, "invalid token: {}", reason),
            OAuthError::InsufficientScope { requirement } => write!(
                f,
                "insufficient scope: any of [{}] is required",
                requirement.describe()
            ),
            OAuthError::Upstream(err) => write!(f, "authorization server unavailable: {}", err),
        }
    }
}

impl std::error::Error for OAuthError {}
