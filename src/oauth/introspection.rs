//! OAuth 2.0 token introspection client (RFC 7662).
//!
//! The resource server never inspects tokens itself. Every request's token
//! is POSTed to the authorization server's introspection endpoint and the
//! answer is decoded into an [`IntrospectionResponse`]:
//!
//! - `{"active": true, "client_id": .., "sub": .., "scope": .., "exp"?: ..}`
//!   becomes [`IntrospectionResponse::Active`]
//! - `{"active": false, ...}` becomes [`IntrospectionResponse::Inactive`]
//! - anything else is [`IntrospectionError::Malformed`]
//!
//! An inactive token is an ordinary outcome. Malformed bodies, non-2xx
//! statuses and transport failures mean the authorization server is
//! misbehaving and are logged as such so operators can tell the two apart.

use std::time::Duration;

use axum::http::header;
use serde::Deserialize;
use url::Url;

use super::token::TokenValidator;
use crate::config::GateConfig;

/// Introspection data for an active token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveToken {
    /// Client that obtained the token.
    pub client_id: String,
    /// Resource owner (user id).
    pub sub: String,
    /// Space-delimited granted scopes. Empty when the server sent none.
    pub scope: String,
    /// Expiry as Unix seconds.
    pub exp: Option<u64>,
}

impl ActiveToken {
    pub fn new(
        client_id: impl Into<String>,
        sub: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            sub: sub.into(),
            scope: scope.into(),
            exp: None,
        }
    }

    /// Set the expiry timestamp.
    pub fn expires_at(mut self, exp: u64) -> Self {
        self.exp = Some(exp);
        self
    }
}

/// Decoded introspection response, tagged on the `active` member.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawIntrospection")]
pub enum IntrospectionResponse {
    Active(ActiveToken),
    Inactive,
}

#[derive(Deserialize)]
struct RawIntrospection {
    active: bool,
    #[serde(default)]
    client_id: Option<serde_json::Value>,
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    scope: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<serde_json::Value>,
}

impl TryFrom<RawIntrospection> for IntrospectionResponse {
    type Error = String;

    fn try_from(raw: RawIntrospection) -> Result<Self, Self::Error> {
        if !raw.active {
            return Ok(IntrospectionResponse::Inactive);
        }

        let client_id = required_string(raw.client_id, "client_id")?;
        let sub = required_string(raw.sub, "sub")?;
        let scope = match raw.scope {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s,
            Some(other) => return Err(format!("`scope` must be a string, got {}", other)),
        };
        let exp = match raw.exp {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .ok_or_else(|| format!("`exp` must be a non-negative integer, got {}", value))?,
            ),
        };

        Ok(IntrospectionResponse::Active(ActiveToken {
            client_id,
            sub,
            scope,
            exp,
        }))
    }
}

fn required_string(value: Option<serde_json::Value>, field: &str) -> Result<String, String> {
    match value {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Err(format!("`{}` must be a string, got {}", field, other)),
        None => Err(format!("active token is missing `{}`", field)),
    }
}

/// Why introspection did not produce an [`ActiveToken`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectionError {
    /// The authorization server says the token is not active.
    #[error("token is not active")]
    Inactive,

    /// The introspection endpoint answered with a non-success status.
    #[error("introspection endpoint returned HTTP {0}")]
    UpstreamStatus(u16),

    /// The response body matched neither the active nor the inactive shape.
    #[error("malformed introspection response: {0}")]
    Malformed(String),

    /// The introspection endpoint could not be reached.
    #[error("introspection request failed: {0}")]
    Transport(String),
}

impl IntrospectionError {
    /// Returns true when the failure lies with the authorization server
    /// rather than with the presented token.
    pub fn is_upstream_failure(&self) -> bool {
        !matches!(self, IntrospectionError::Inactive)
    }
}

/// Client for a remote RFC 7662 introspection endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use mcp_resource_gate::oauth::{IntrospectionClient, IntrospectionResponse};
///
/// # async fn run() -> Result<(), mcp_resource_gate::BoxError> {
/// let endpoint = "https://auth.example.com/oauth/introspection".parse()?;
/// let client = IntrospectionClient::new(endpoint, Duration::from_secs(5))?;
///
/// match client.introspect("some-token").await? {
///     IntrospectionResponse::Active(active) => println!("user {}", active.sub),
///     IntrospectionResponse::Inactive => println!("inactive"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IntrospectionClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl IntrospectionClient {
    /// Create a client for the given endpoint with a per-call timeout.
    pub fn new(endpoint: Url, timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, endpoint))
    }

    /// Create a client from the gate configuration.
    pub fn from_config(config: &GateConfig) -> crate::Result<Self> {
        Self::new(
            config.introspection_endpoint().clone(),
            config.introspection_timeout(),
        )
    }

    /// Create a client that reuses an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// Ask the authorization server about a token.
    ///
    /// Sends `token=<token>` form-encoded, once. No retries.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionResponse, IntrospectionError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %self.endpoint, error = %e, "Token introspection request failed");
                IntrospectionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Introspection endpoint returned non-success status"
            );
            return Err(IntrospectionError::UpstreamStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(endpoint = %self.endpoint, error = %e, "Failed to read introspection response");
            IntrospectionError::Transport(e.to_string())
        })?;

        let decoded = serde_json::from_slice::<IntrospectionResponse>(&body).map_err(|e| {
            tracing::warn!(
                endpoint = %self.endpoint,
                error = %e,
                "Authorization server sent a malformed introspection response"
            );
            IntrospectionError::Malformed(e.to_string())
        })?;

        tracing::debug!(
            active = matches!(decoded, IntrospectionResponse::Active(_)),
            "Token introspection completed"
        );
        Ok(decoded)
    }
}

impl TokenValidator for IntrospectionClient {
    async fn validate_token(&self, token: &str) -> Result<ActiveToken, IntrospectionError> {
        match self.introspect(token).await? {
            IntrospectionResponse::Active(active) => Ok(active),
            IntrospectionResponse::Inactive => Err(IntrospectionError::Inactive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<IntrospectionResponse, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_decode_active() {
        let decoded = decode(json!({
            "active": true,
            "client_id": "abc",
            "scope": "entries:read tags:read",
            "sub": "42",
            "exp": 1_900_000_000u64
        }))
        .unwrap();

        assert_eq!(
            decoded,
            IntrospectionResponse::Active(
                ActiveToken::new("abc", "42", "entries:read tags:read").expires_at(1_900_000_000)
            )
        );
    }

    #[test]
    fn test_decode_inactive_ignores_other_members() {
        assert_eq!(
            decode(json!({"active": false})).unwrap(),
            IntrospectionResponse::Inactive
        );
        assert_eq!(
            decode(json!({"active": false, "sub": 7})).unwrap(),
            IntrospectionResponse::Inactive
        );
    }

    #[test]
    fn test_decode_missing_scope_is_empty() {
        let decoded = decode(json!({"active": true, "client_id": "abc", "sub": "42"})).unwrap();
        let IntrospectionResponse::Active(active) = decoded else {
            panic!("expected active token");
        };
        assert_eq!(active.scope, "");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode(json!({"client_id": "abc"})).is_err());
        assert!(decode(json!({"active": "yes"})).is_err());
        assert!(decode(json!({"active": true, "sub": "42"})).is_err());
        assert!(decode(json!({"active": true, "client_id": "abc", "sub": 42})).is_err());
        assert!(
            decode(json!({"active": true, "client_id": "abc", "sub": "42", "scope": ["a"]}))
                .is_err()
        );
        assert!(
            decode(json!({"active": true, "client_id": "abc", "sub": "42", "exp": -5})).is_err()
        );
        assert!(decode(json!([true])).is_err());
    }

    #[test]
    fn test_upstream_failure_classification() {
        assert!(!IntrospectionError::Inactive.is_upstream_failure());
        assert!(IntrospectionError::UpstreamStatus(500).is_upstream_failure());
        assert!(IntrospectionError::Malformed("x".into()).is_upstream_failure());
        assert!(IntrospectionError::Transport("x".into()).is_upstream_failure());
    }

    /// Serve a fixed introspection answer and return the endpoint URL.
    async fn start_introspection_server(status: StatusCode, body: &'static str) -> Url {
        let app = Router::new().route(
            "/oauth/introspection",
            post(move |form: axum::Form<std::collections::HashMap<String, String>>| async move {
                assert!(form.contains_key("token"));
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://127.0.0.1:{}/oauth/introspection", addr.port())
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_client_active() {
        let endpoint = start_introspection_server(
            StatusCode::OK,
            r#"{"active":true,"client_id":"abc","scope":"user:read","sub":"42"}"#,
        )
        .await;
        let client = IntrospectionClient::new(endpoint, Duration::from_secs(5)).unwrap();

        let active = client.validate_token("tok").await.unwrap();
        assert_eq!(active, ActiveToken::new("abc", "42", "user:read"));
    }

    #[tokio::test]
    async fn test_client_inactive() {
        let endpoint = start_introspection_server(StatusCode::OK, r#"{"active":false}"#).await;
        let client = IntrospectionClient::new(endpoint, Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.validate_token("tok").await,
            Err(IntrospectionError::Inactive)
        );
    }

    #[tokio::test]
    async fn test_client_non_success_status() {
        let endpoint =
            start_introspection_server(StatusCode::SERVICE_UNAVAILABLE, r#"{"active":true}"#).await;
        let client = IntrospectionClient::new(endpoint, Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.introspect("tok").await,
            Err(IntrospectionError::UpstreamStatus(503))
        );
    }

    #[tokio::test]
    async fn test_client_malformed_body() {
        let endpoint = start_introspection_server(StatusCode::OK, "<html>oops</html>").await;
        let client = IntrospectionClient::new(endpoint, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.introspect("tok").await,
            Err(IntrospectionError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_client_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = format!("http://127.0.0.1:{}/oauth/introspection", port)
            .parse()
            .unwrap();
        let client = IntrospectionClient::new(endpoint, Duration::from_secs(2)).unwrap();

        assert!(matches!(
            client.introspect("tok").await,
            Err(IntrospectionError::Transport(_))
        ));
    }
}
