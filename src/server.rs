//! Assemble the resource server: discovery routes plus gated protected routes.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::GateConfig;
use crate::error::Result;
use crate::oauth::{DiscoveryState, IntrospectionClient, OAuthLayer, TokenValidator, discovery_router};

/// A resource server wrapping caller-provided protected routes.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::post};
/// use mcp_resource_gate::config::GateConfig;
/// use mcp_resource_gate::oauth::AuthInfo;
/// use mcp_resource_gate::server::ResourceServer;
///
/// # async fn run() -> Result<(), mcp_resource_gate::BoxError> {
/// let server = ResourceServer::new(GateConfig::from_env()?)?;
///
/// let protected = Router::new().route(
///     "/mcp",
///     post(|auth: AuthInfo| async move { format!("hello user {}", auth.subject()) }),
/// );
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8787").await?;
/// server.serve(listener, protected).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResourceServer<V: TokenValidator = IntrospectionClient> {
    config: Arc<GateConfig>,
    validator: V,
    discovery: DiscoveryState,
}

impl ResourceServer<IntrospectionClient> {
    /// Create a server that validates tokens against the configured
    /// introspection endpoint.
    ///
    /// Introspection and the metadata proxy share one HTTP client.
    pub fn new(config: GateConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.introspection_timeout())
            .build()?;
        let validator =
            IntrospectionClient::with_client(http.clone(), config.introspection_endpoint().clone());
        let config = Arc::new(config);
        let discovery = DiscoveryState::new(config.clone(), http)?;

        Ok(Self {
            config,
            validator,
            discovery,
        })
    }
}

impl<V: TokenValidator> ResourceServer<V> {
    /// Create a server with a custom token validator.
    pub fn with_validator(config: GateConfig, validator: V) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.introspection_timeout())
            .build()?;
        let config = Arc::new(config);
        let discovery = DiscoveryState::new(config.clone(), http)?;

        Ok(Self {
            config,
            validator,
            discovery,
        })
    }

    pub fn config(&self) -> &Arc<GateConfig> {
        &self.config
    }

    /// The gate layer, for callers assembling their own router.
    pub fn gate(&self) -> OAuthLayer<V> {
        OAuthLayer::new(self.validator.clone(), self.config.clone())
    }

    /// Build the full application.
    ///
    /// Every route in `protected` sits behind the gate; discovery routes are
    /// public. Unmatched paths fall through to a plain 404.
    pub fn router(&self, protected: Router) -> Router {
        protected
            .route_layer(self.gate())
            .merge(discovery_router(self.discovery.clone()))
    }

    /// Serve the application on `listener` until the process exits.
    pub async fn serve(self, listener: TcpListener, protected: Router) -> Result<()> {
        let app = self.router(protected);
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            resource = %self.config.resource_path(),
            metadata = %self.config.metadata_path(),
            auth_server = %self.config.auth_server(),
            "Starting MCP resource server"
        );
        axum::serve(listener, app).await?;
        Ok(())
    }
}
