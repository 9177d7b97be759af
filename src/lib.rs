//! # mcp-resource-gate
//!
//! OAuth 2.1 resource server support for Model Context Protocol (MCP)
//! endpoints, built on [Tower](https://docs.rs/tower) and
//! [axum](https://docs.rs/axum).
//!
//! The MCP endpoint never issues tokens. It trusts an external
//! authorization server, asks it about each bearer token (RFC 7662
//! introspection), checks the token's scopes, and tells unauthenticated
//! clients where to go through RFC 9728 discovery metadata.
//!
//! ## What Happens to a Request
//!
//! - **No `Authorization` header**: `401` with a bare
//!   `WWW-Authenticate: Bearer realm="EpicMe", resource_metadata=...`
//! - **Inactive, unknown or expired token**: `401` with
//!   `error="invalid_token"`
//! - **Active token, not enough scope**: `403` with
//!   `error="insufficient_scope"` listing every acceptable combination
//! - **Otherwise**: the request reaches the handler, which reads the caller
//!   with the [`oauth::AuthInfo`] extractor
//!
//! Discovery routes (`/.well-known/oauth-protected-resource/mcp` and
//! `/.well-known/oauth-authorization-server`) are public and CORS-open.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::post};
//! use mcp_resource_gate::BoxError;
//! use mcp_resource_gate::config::GateConfig;
//! use mcp_resource_gate::oauth::AuthInfo;
//! use mcp_resource_gate::server::ResourceServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     // EPIC_ME_AUTH_SERVER_URL, MCP_RESOURCE_PATH, INTROSPECTION_TIMEOUT_SECS
//!     let server = ResourceServer::new(GateConfig::from_env()?)?;
//!
//!     let protected = Router::new().route(
//!         "/mcp",
//!         post(|auth: AuthInfo| async move {
//!             format!("{} may use {:?}", auth.subject(), auth.scopes())
//!         }),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8787").await?;
//!     server.serve(listener, protected).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Per-Capability Scopes
//!
//! The endpoint-level requirement only decides whether a token may reach
//! the handler at all. Inside, [`oauth::ScopePolicy`] maps tools, resources
//! and prompts to the scopes they need:
//!
//! ```rust
//! use mcp_resource_gate::oauth::ScopePolicy;
//!
//! let policy = ScopePolicy::new()
//!     .tool_scope("create_entry", "entries:write")
//!     .tool_scope("list_tags", "tags:read");
//! # let _ = policy;
//! ```

pub mod config;
pub mod error;
pub mod oauth;
pub mod server;

// Re-exports
pub use config::{GateConfig, GateConfigBuilder, UpstreamFailurePolicy};
pub use error::{BoxError, Error, Result};
pub use server::ResourceServer;
