//! OAuth 2.1 resource server support for MCP.
//!
//! The MCP server acts as a **resource server**: it validates tokens issued
//! by an external authorization server and serves discovery metadata. It
//! never issues tokens itself.
//!
//! # Architecture
//!
//! - **Token extraction** ([`extract_bearer_token`]): pulls the bearer token
//!   out of the `Authorization` header.
//!
//! - **Introspection** ([`IntrospectionClient`]): asks the authorization
//!   server whether a token is active (RFC 7662). Pluggable through the
//!   [`TokenValidator`] trait.
//!
//! - **Scopes** ([`ScopeRequirement`], [`ScopePolicy`]): "any one of these
//!   minimal combinations" at the endpoint, all-of checks per capability.
//!
//! - **Challenges** ([`Challenge`]): `WWW-Authenticate` values for 401 and
//!   403 responses (RFC 6750, RFC 9728 `resource_metadata`).
//!
//! - **Discovery** ([`discovery_router`]): Protected Resource Metadata and
//!   the back-compat authorization server metadata proxy.
//!
//! - **HTTP Middleware** ([`OAuthLayer`]/[`OAuthService`]): the gate itself,
//!   injecting [`AuthInfo`] into request extensions.
//!
//! # Discovery Flow
//!
//! 1. Client requests `/mcp` without a token
//! 2. Server returns `401` with `WWW-Authenticate: Bearer realm="EpicMe", resource_metadata=...`
//! 3. Client fetches `/.well-known/oauth-protected-resource/mcp` to find the authorization server
//! 4. Client obtains a token from the authorization server
//! 5. Client retries with `Authorization: Bearer <token>`

pub mod challenge;
pub mod discovery;
pub mod error;
pub mod introspection;
pub mod metadata;
pub mod middleware;
pub mod request_url;
pub mod scope;
pub mod token;

// Re-exports
pub use challenge::{BearerError, Challenge};
pub use discovery::{DiscoveryState, discovery_router};
pub use error::OAuthError;
pub use introspection::{ActiveToken, IntrospectionClient, IntrospectionError, IntrospectionResponse};
pub use metadata::ProtectedResourceMetadata;
pub use middleware::{OAuthLayer, OAuthService, authorize};
pub use scope::{ScopePolicy, ScopeRequirement, has_sufficient_scope, validate_scopes};
pub use token::{AuthInfo, TokenValidator, extract_bearer_token};
