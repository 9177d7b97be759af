//! Discovery endpoints.
//!
//! - `GET /.well-known/oauth-protected-resource/<resource-path>` answers with
//!   [`ProtectedResourceMetadata`] built from the current request's URL.
//! - `GET /.well-known/oauth-authorization-server` fetches the authorization
//!   server's own metadata and forwards it verbatim, for older clients that
//!   expect the resource server to also be the authorization server and
//!   cannot follow a redirect during discovery.
//!
//! Both are unauthenticated and CORS-open: MCP clients call them
//! cross-origin before any trust relationship exists.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use url::Url;

use super::metadata::{ProtectedResourceMetadata, fetch_authorization_server_metadata};
use super::request_url::request_url;
use crate::config::GateConfig;

/// Header MCP clients send on every request, including discovery.
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Shared state for the discovery handlers.
#[derive(Clone)]
pub struct DiscoveryState {
    config: Arc<GateConfig>,
    http: reqwest::Client,
    authorization_server_metadata_url: Url,
}

impl DiscoveryState {
    pub fn new(config: Arc<GateConfig>, http: reqwest::Client) -> crate::Result<Self> {
        let authorization_server_metadata_url = config.authorization_server_metadata_url()?;
        Ok(Self {
            config,
            http,
            authorization_server_metadata_url,
        })
    }
}

/// CORS policy applied to discovery routes.
pub fn discovery_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([HeaderName::from_static(MCP_PROTOCOL_VERSION_HEADER)])
}

/// Router serving both discovery documents.
pub fn discovery_router(state: DiscoveryState) -> Router {
    let metadata_path = state.config.metadata_path();
    Router::new()
        .route(&metadata_path, get(protected_resource_metadata))
        .route(
            ProtectedResourceMetadata::AUTHORIZATION_SERVER_PATH,
            get(authorization_server_metadata),
        )
        .layer(discovery_cors())
        .with_state(state)
}

async fn protected_resource_metadata(
    State(state): State<DiscoveryState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some(url) = request_url(&uri, &headers, state.config.default_scheme()) else {
        tracing::debug!("Discovery request without a usable Host header");
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    let metadata = ProtectedResourceMetadata::for_request(&state.config, &url);
    tracing::debug!(resource = %metadata.resource, "Serving protected resource metadata");
    axum::Json(metadata).into_response()
}

async fn authorization_server_metadata(State(state): State<DiscoveryState>) -> Response {
    match fetch_authorization_server_metadata(&state.http, &state.authorization_server_metadata_url)
        .await
    {
        Ok(document) => axum::Json(document).into_response(),
        Err(e) => {
            tracing::warn!(
                url = %state.authorization_server_metadata_url,
                error = %e,
                "Failed to fetch authorization server metadata"
            );
            let body = serde_json::json!({
                "error": "server_error",
                "error_description": "Authorization server metadata is unavailable"
            });
            (StatusCode::BAD_GATEWAY, axum::Json(body)).into_response()
        }
    }
}
