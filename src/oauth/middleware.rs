//! The authorization gate as tower middleware.
//!
//! Provides [`OAuthLayer`] and [`OAuthService`], which run every request to
//! a protected route through bearer extraction, token validation and scope
//! evaluation before it reaches the inner service.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, Request, header};
use axum::response::Response;
use tower::Layer;

use super::challenge::Challenge;
use super::error::OAuthError;
use super::request_url::{request_url, with_path};
use super::scope::has_sufficient_scope;
use super::token::{AuthInfo, TokenValidator, extract_bearer_token};
use crate::config::{GateConfig, UpstreamFailurePolicy};

/// Tower layer that puts the authorization gate in front of a service.
///
/// On success the validated [`AuthInfo`] is inserted into the request
/// extensions, where handlers read it with the `AuthInfo` extractor.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use axum::{Router, routing::post};
/// use mcp_resource_gate::config::GateConfig;
/// use mcp_resource_gate::oauth::{AuthInfo, IntrospectionClient, OAuthLayer};
///
/// # fn build() -> Result<Router, mcp_resource_gate::BoxError> {
/// let config = Arc::new(GateConfig::from_env()?);
/// let validator = IntrospectionClient::from_config(&config)?;
///
/// let app = Router::new()
///     .route("/mcp", post(|auth: AuthInfo| async move { auth.subject().to_string() }))
///     .route_layer(OAuthLayer::new(validator, config));
/// # Ok(app)
/// # }
/// ```
#[derive(Clone)]
pub struct OAuthLayer<V: TokenValidator> {
    validator: V,
    config: Arc<GateConfig>,
}

impl<V: TokenValidator> OAuthLayer<V> {
    /// Create a new gate with the given token validator and configuration.
    pub fn new(validator: V, config: Arc<GateConfig>) -> Self {
        Self { validator, config }
    }
}

impl<S, V: TokenValidator> Layer<S> for OAuthLayer<V> {
    type Service = OAuthService<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        OAuthService {
            inner,
            validator: self.validator.clone(),
            config: self.config.clone(),
        }
    }
}

/// Tower service that authorizes requests before forwarding them.
///
/// Created by [`OAuthLayer`]. For each incoming request:
///
/// 1. Extracts the `Authorization: Bearer <token>` header
/// 2. Validates the token via [`TokenValidator`]
/// 3. Checks the configured scope combinations
/// 4. On success, injects [`AuthInfo`] into request extensions
/// 5. On failure, returns 401/403 with a `WWW-Authenticate` challenge
///
/// Each request makes exactly one pass; nothing is retried or cached.
#[derive(Clone)]
pub struct OAuthService<S, V: TokenValidator> {
    inner: S,
    validator: V,
    config: Arc<GateConfig>,
}

impl<S, V> tower_service::Service<Request<Body>> for OAuthService<S, V>
where
    S: tower_service::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<crate::BoxError> + Send,
    V: TokenValidator,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let validator = self.validator.clone();
        let config = self.config.clone();
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // Dropping this future (client gone) drops any in-flight introspection.
        Box::pin(async move {
            match authorize(&validator, &config, req.headers()).await {
                Ok(auth) => {
                    tracing::debug!(
                        outcome = "authorized",
                        client_id = %auth.client_id(),
                        subject = %auth.subject(),
                        "Request authorized"
                    );
                    req.extensions_mut().insert(auth);
                    inner.call(req).await
                }
                Err(error) => {
                    tracing::debug!(
                        outcome = error.outcome(),
                        path = %req.uri().path(),
                        "Request rejected"
                    );
                    Ok(reject(&config, &req, error))
                }
            }
        })
    }
}

/// Run one request's headers through the gate.
///
/// Returns the validated [`AuthInfo`] or the error that decides the response.
pub async fn authorize<V: TokenValidator>(
    validator: &V,
    config: &GateConfig,
    headers: &HeaderMap,
) -> Result<AuthInfo, OAuthError> {
    let Some(raw) = headers.get(header::AUTHORIZATION) else {
        return Err(OAuthError::MissingToken);
    };

    let Some(token) = extract_bearer_token(raw.to_str().ok()) else {
        return Err(OAuthError::InvalidToken {
            reason: "authorization header does not carry a bearer token".to_string(),
        });
    };

    let active = match validator.validate_token(token).await {
        Ok(active) => active,
        Err(error) if error.is_upstream_failure() => {
            return Err(match config.upstream_failure() {
                UpstreamFailurePolicy::FailClosed => OAuthError::InvalidToken {
                    reason: error.to_string(),
                },
                UpstreamFailurePolicy::ServerError => OAuthError::Upstream(error),
            });
        }
        Err(error) => {
            return Err(OAuthError::InvalidToken {
                reason: error.to_string(),
            });
        }
    };

    let auth = AuthInfo::from_active(token, active);
    if auth.is_expired() {
        return Err(OAuthError::InvalidToken {
            reason: "token has expired".to_string(),
        });
    }

    if !has_sufficient_scope(&auth, config.scope_requirement()) {
        return Err(OAuthError::InsufficientScope {
            requirement: config.scope_requirement().clone(),
        });
    }

    Ok(auth)
}

/// Build the rejection response for a request that failed the gate.
fn reject(config: &GateConfig, req: &Request<Body>, error: OAuthError) -> Response {
    let metadata_url = request_url(req.uri(), req.headers(), config.default_scheme())
        .map(|url| with_path(&url, &config.metadata_path()));
    if metadata_url.is_none() {
        tracing::warn!("Cannot determine request URL; challenge sent without resource_metadata");
    }

    let mut challenge = error.challenge(config.realm(), metadata_url);
    if config.advertise_scope_hint() && error.status_code() == 401 {
        challenge = challenge.map(|c| c.scope(config.scopes_supported().join(" ")));
    }
    tracing::trace!(
        status = error.status_code().as_u16(),
        bearer_error = challenge
            .as_ref()
            .and_then(Challenge::bearer_error)
            .map(|e| e.as_str()),
        "Sending rejection"
    );

    error.into_response_with(challenge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::introspection::{ActiveToken, IntrospectionError};
    use crate::oauth::scope::ScopeRequirement;
    use axum::http::StatusCode;
    use std::collections::HashMap;
    use tower::ServiceExt;
    use tower_service::Service;

    /// A minimal inner service that echoes the authorized subject
    #[derive(Clone)]
    struct EchoSubject;

    impl tower_service::Service<Request<Body>> for EchoSubject {
        type Response = Response;
        type Error = std::convert::Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Body>) -> Self::Future {
            let subject = req
                .extensions()
                .get::<AuthInfo>()
                .map(|auth| auth.subject().to_string())
                .unwrap_or_default();
            Box::pin(async move {
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from(subject))
                    .unwrap())
            })
        }
    }

    /// Validator backed by a fixed token table.
    #[derive(Clone)]
    struct StaticValidator {
        tokens: Arc<HashMap<String, Result<ActiveToken, IntrospectionError>>>,
    }

    impl StaticValidator {
        fn with(entries: Vec<(&str, Result<ActiveToken, IntrospectionError>)>) -> Self {
            Self {
                tokens: Arc::new(
                    entries
                        .into_iter()
                        .map(|(token, result)| (token.to_string(), result))
                        .collect(),
                ),
            }
        }
    }

    impl TokenValidator for StaticValidator {
        async fn validate_token(&self, token: &str) -> Result<ActiveToken, IntrospectionError> {
            self.tokens
                .get(token)
                .cloned()
                .unwrap_or(Err(IntrospectionError::Inactive))
        }
    }

    fn validator() -> StaticValidator {
        StaticValidator::with(vec![
            (
                "reader",
                Ok(ActiveToken::new("abc", "42", "entries:read tags:read")),
            ),
            ("noscope", Ok(ActiveToken::new("abc", "7", ""))),
            (
                "expired",
                Ok(ActiveToken::new("abc", "42", "entries:read").expires_at(1)),
            ),
            ("broken", Err(IntrospectionError::Malformed("bad".into()))),
            ("down", Err(IntrospectionError::Transport("refused".into()))),
            ("flaky", Err(IntrospectionError::UpstreamStatus(503))),
        ])
    }

    fn config() -> Arc<GateConfig> {
        Arc::new(GateConfig::builder("http://localhost:7788").build().unwrap())
    }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("host", "localhost:8787");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn www_authenticate(resp: &Response) -> String {
        resp.headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_missing_token_returns_401() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service.ready().await.unwrap().call(request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            www_authenticate(&resp),
            "Bearer realm=\"EpicMe\", resource_metadata=http://localhost:8787/.well-known/oauth-protected-resource/mcp"
        );
    }

    #[tokio::test]
    async fn test_inactive_token_returns_401() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer unknown")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let header = www_authenticate(&resp);
        assert!(header.contains("error=\"invalid_token\""));
        assert!(header.contains("error_description="));
        assert!(header.contains("resource_metadata="));
    }

    #[tokio::test]
    async fn test_non_bearer_header_is_invalid_token() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Basic dXNlcjpwYXNz")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(www_authenticate(&resp).contains("error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn test_valid_token_passes_with_auth_info() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("bearer reader")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"42");
    }

    #[tokio::test]
    async fn test_insufficient_scope_returns_403() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer noscope")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            www_authenticate(&resp),
            "Bearer realm=\"EpicMe\", error=\"insufficient_scope\", \
             error_description=\"Any of the following combinations of scopes is valid: \
             user:read, entries:read, entries:write, tags:read, tags:write\""
        );
    }

    #[tokio::test]
    async fn test_expired_active_token_returns_401() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer expired")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upstream_failure_fails_closed_by_default() {
        let mut service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer broken")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(www_authenticate(&resp).contains("error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn test_upstream_failure_as_server_error() {
        let config = Arc::new(
            GateConfig::builder("http://localhost:7788")
                .upstream_failure(UpstreamFailurePolicy::ServerError)
                .build()
                .unwrap(),
        );
        let mut service = OAuthLayer::new(validator(), config).layer(EchoSubject);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer broken")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(resp.headers().get("WWW-Authenticate").is_none());

        for token in ["Bearer down", "Bearer flaky"] {
            let resp = service
                .ready()
                .await
                .unwrap()
                .call(request(Some(token)))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_GATEWAY, "{token}");
        }

        // A plainly inactive token is still a 401
        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer unknown")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scope_hint_on_401_only() {
        let config = Arc::new(
            GateConfig::builder("http://localhost:7788")
                .scopes_supported(["entries:read", "tags:read"])
                .scope_requirement(ScopeRequirement::any_single(["user:read"]))
                .advertise_scope_hint(true)
                .build()
                .unwrap(),
        );
        let mut service = OAuthLayer::new(validator(), config).layer(EchoSubject);

        let resp = service.ready().await.unwrap().call(request(None)).await.unwrap();
        assert!(www_authenticate(&resp).ends_with("scope=\"entries:read tags:read\""));

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer reader")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(!www_authenticate(&resp).contains("scope=\""));
    }

    #[tokio::test]
    async fn test_repeated_requests_same_outcome() {
        let service = OAuthLayer::new(validator(), config()).layer(EchoSubject);

        for _ in 0..3 {
            let resp = service
                .clone()
                .oneshot(request(Some("Bearer reader")))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
