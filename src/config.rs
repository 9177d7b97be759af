//! Gate configuration.
//!
//! [`GateConfig`] is the only state shared between concurrent gate
//! evaluations. It is built once at startup, wrapped in an `Arc`, and never
//! mutated afterwards.
//!
//! ```rust
//! use mcp_resource_gate::config::GateConfig;
//! use mcp_resource_gate::oauth::ScopeRequirement;
//!
//! let config = GateConfig::builder("https://auth.example.com")
//!     .realm("EpicMe")
//!     .resource_path("/mcp")
//!     .scope_requirement(ScopeRequirement::any_of([["entries:read"], ["tags:read"]]))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     config.introspection_endpoint().as_str(),
//!     "https://auth.example.com/oauth/introspection"
//! );
//! ```

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::oauth::metadata::ProtectedResourceMetadata;
use crate::oauth::scope::ScopeRequirement;

/// Environment variable naming the authorization server base URL.
pub const AUTH_SERVER_URL_ENV: &str = "EPIC_ME_AUTH_SERVER_URL";
/// Environment variable overriding the protected endpoint path.
pub const RESOURCE_PATH_ENV: &str = "MCP_RESOURCE_PATH";
/// Environment variable overriding the introspection timeout, in seconds.
pub const INTROSPECTION_TIMEOUT_ENV: &str = "INTROSPECTION_TIMEOUT_SECS";

const DEFAULT_AUTH_SERVER_URL: &str = "http://localhost:7788";
const DEFAULT_REALM: &str = "EpicMe";
const DEFAULT_RESOURCE_PATH: &str = "/mcp";
const DEFAULT_INTROSPECTION_PATH: &str = "/oauth/introspection";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scopes the EpicMe journal advertises in `scopes_supported`.
pub const DEFAULT_SUPPORTED_SCOPES: [&str; 5] = [
    "user:read",
    "entries:read",
    "entries:write",
    "tags:read",
    "tags:write",
];

/// What the gate answers when the authorization server misbehaves
/// (transport error, non-2xx status, or a body that decodes to neither an
/// active nor an inactive introspection response).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpstreamFailurePolicy {
    /// Treat the credential as invalid: 401 with an `invalid_token` challenge.
    #[default]
    FailClosed,
    /// Answer `502 Bad Gateway` so callers can tell an outage from a bad token.
    ServerError,
}

/// Read-only configuration for the authorization gate and discovery routes.
#[derive(Debug, Clone)]
pub struct GateConfig {
    auth_server: String,
    auth_server_url: Url,
    introspection_endpoint: Url,
    realm: String,
    resource_path: String,
    scopes_supported: Vec<String>,
    scope_requirement: ScopeRequirement,
    introspection_timeout: Duration,
    upstream_failure: UpstreamFailurePolicy,
    advertise_scope_hint: bool,
    default_scheme: String,
}

impl GateConfig {
    /// Start building a configuration for the given authorization server.
    pub fn builder(auth_server: impl Into<String>) -> GateConfigBuilder {
        GateConfigBuilder::new(auth_server)
    }

    /// Build a configuration from the process environment.
    ///
    /// Reads [`AUTH_SERVER_URL_ENV`], [`RESOURCE_PATH_ENV`] and
    /// [`INTROSPECTION_TIMEOUT_ENV`]; everything else takes its default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let auth_server =
            lookup(AUTH_SERVER_URL_ENV).unwrap_or_else(|| DEFAULT_AUTH_SERVER_URL.to_string());
        let mut builder = Self::builder(auth_server);

        if let Some(path) = lookup(RESOURCE_PATH_ENV) {
            builder = builder.resource_path(path);
        }
        if let Some(raw) = lookup(INTROSPECTION_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::config(format!(
                    "{INTROSPECTION_TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            builder = builder.introspection_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Authorization server issuer, exactly as configured.
    pub fn auth_server(&self) -> &str {
        &self.auth_server
    }

    /// Authorization server base URL.
    pub fn auth_server_url(&self) -> &Url {
        &self.auth_server_url
    }

    /// Absolute URL of the token introspection endpoint.
    pub fn introspection_endpoint(&self) -> &Url {
        &self.introspection_endpoint
    }

    /// Absolute URL of the authorization server's own metadata document.
    pub fn authorization_server_metadata_url(&self) -> Result<Url> {
        Ok(self
            .auth_server_url
            .join(ProtectedResourceMetadata::AUTHORIZATION_SERVER_PATH)?)
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Path of the protected endpoint, e.g. `/mcp`.
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Path where this resource's protected-resource metadata is served.
    pub fn metadata_path(&self) -> String {
        ProtectedResourceMetadata::well_known_path_for(&self.resource_path)
    }

    pub fn scopes_supported(&self) -> &[String] {
        &self.scopes_supported
    }

    /// Minimal scope combinations accepted at the protected endpoint.
    pub fn scope_requirement(&self) -> &ScopeRequirement {
        &self.scope_requirement
    }

    pub fn introspection_timeout(&self) -> Duration {
        self.introspection_timeout
    }

    pub fn upstream_failure(&self) -> UpstreamFailurePolicy {
        self.upstream_failure
    }

    /// Whether 401 challenges carry a `scope` hint listing supported scopes.
    pub fn advertise_scope_hint(&self) -> bool {
        self.advertise_scope_hint
    }

    /// Scheme assumed when a request carries no scheme information.
    pub fn default_scheme(&self) -> &str {
        &self.default_scheme
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Clone)]
pub struct GateConfigBuilder {
    auth_server: String,
    realm: String,
    resource_path: String,
    introspection_path: String,
    scopes_supported: Vec<String>,
    scope_requirement: Option<ScopeRequirement>,
    introspection_timeout: Duration,
    upstream_failure: UpstreamFailurePolicy,
    advertise_scope_hint: bool,
    default_scheme: String,
}

impl GateConfigBuilder {
    fn new(auth_server: impl Into<String>) -> Self {
        Self {
            auth_server: auth_server.into(),
            realm: DEFAULT_REALM.to_string(),
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
            introspection_path: DEFAULT_INTROSPECTION_PATH.to_string(),
            scopes_supported: DEFAULT_SUPPORTED_SCOPES.iter().map(|s| s.to_string()).collect(),
            scope_requirement: None,
            introspection_timeout: DEFAULT_TIMEOUT,
            upstream_failure: UpstreamFailurePolicy::default(),
            advertise_scope_hint: false,
            default_scheme: "http".to_string(),
        }
    }

    /// Set the realm reported in every challenge.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Set the protected endpoint path.
    pub fn resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = path.into();
        self
    }

    /// Set the introspection path, resolved against the authorization server.
    pub fn introspection_path(mut self, path: impl Into<String>) -> Self {
        self.introspection_path = path.into();
        self
    }

    /// Replace the advertised scopes.
    pub fn scopes_supported(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes_supported = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the scope combinations accepted at the protected endpoint.
    ///
    /// Defaults to "any single supported scope". A requirement with no
    /// combinations is rejected by [`build`](Self::build).
    pub fn scope_requirement(mut self, requirement: ScopeRequirement) -> Self {
        self.scope_requirement = Some(requirement);
        self
    }

    pub fn introspection_timeout(mut self, timeout: Duration) -> Self {
        self.introspection_timeout = timeout;
        self
    }

    pub fn upstream_failure(mut self, policy: UpstreamFailurePolicy) -> Self {
        self.upstream_failure = policy;
        self
    }

    /// Add `scope="..."` with the supported scopes to 401 challenges.
    pub fn advertise_scope_hint(mut self, enabled: bool) -> Self {
        self.advertise_scope_hint = enabled;
        self
    }

    /// Scheme used when neither the request URI nor `X-Forwarded-Proto`
    /// says otherwise. Must be `http` or `https`.
    pub fn default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<GateConfig> {
        let auth_server_url = Url::parse(&self.auth_server)?;
        if !matches!(auth_server_url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "authorization server must be an http(s) URL, got {}",
                self.auth_server
            )));
        }
        if !self.resource_path.starts_with('/') {
            return Err(Error::config(format!(
                "resource path must start with '/', got {:?}",
                self.resource_path
            )));
        }
        if !self.introspection_path.starts_with('/') {
            return Err(Error::config(format!(
                "introspection path must start with '/', got {:?}",
                self.introspection_path
            )));
        }
        if !matches!(self.default_scheme.as_str(), "http" | "https") {
            return Err(Error::config(format!(
                "default scheme must be http or https, got {:?}",
                self.default_scheme
            )));
        }

        let introspection_endpoint = auth_server_url.join(&self.introspection_path)?;
        let scope_requirement = self
            .scope_requirement
            .unwrap_or_else(|| ScopeRequirement::any_single(&self.scopes_supported));
        if scope_requirement.is_empty() {
            return Err(Error::config(
                "scope requirement has no combinations and would deny every token",
            ));
        }

        Ok(GateConfig {
            auth_server: self.auth_server,
            auth_server_url,
            introspection_endpoint,
            realm: self.realm,
            resource_path: self.resource_path,
            scopes_supported: self.scopes_supported,
            scope_requirement,
            introspection_timeout: self.introspection_timeout,
            upstream_failure: self.upstream_failure,
            advertise_scope_hint: self.advertise_scope_hint,
            default_scheme: self.default_scheme,
        })
    }
}
