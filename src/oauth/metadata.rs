//! Protected Resource Metadata (RFC 9728 Section 3) and authorization server
//! metadata retrieval (RFC 8414).
//!
//! Defines the metadata document served at
//! `/.well-known/oauth-protected-resource/<resource-path>` so OAuth clients
//! can discover which authorization server issues tokens for this resource.

use serde::Serialize;
use url::Url;

use super::request_url::with_path;
use crate::config::GateConfig;

/// Protected Resource Metadata per RFC 9728 Section 3.
///
/// # Example
///
/// ```rust
/// use mcp_resource_gate::config::GateConfig;
/// use mcp_resource_gate::oauth::ProtectedResourceMetadata;
///
/// let config = GateConfig::builder("http://localhost:7788").build().unwrap();
/// let request_url = "https://mcp.example.com/anything".parse().unwrap();
///
/// let metadata = ProtectedResourceMetadata::for_request(&config, &request_url);
/// assert_eq!(metadata.resource, "https://mcp.example.com/mcp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedResourceMetadata {
    /// The protected endpoint's URL, as the client reaches it.
    pub resource: String,

    /// Authorization server issuer URLs that can issue tokens for this resource.
    pub authorization_servers: Vec<String>,

    /// OAuth scopes supported by this resource server.
    pub scopes_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    /// Prefix of every protected-resource metadata path.
    pub const WELL_KNOWN_PREFIX: &'static str = "/.well-known/oauth-protected-resource";

    /// Path of the authorization server metadata document (RFC 8414).
    pub const AUTHORIZATION_SERVER_PATH: &'static str = "/.well-known/oauth-authorization-server";

    /// Build the document for a request that arrived at `request_url`.
    ///
    /// The resource URL keeps the request's scheme, host and port but uses
    /// the configured protected path, so it is right in every environment.
    pub fn for_request(config: &GateConfig, request_url: &Url) -> Self {
        let resource = with_path(request_url, config.resource_path());
        Self {
            resource: resource.to_string(),
            authorization_servers: vec![config.auth_server().to_string()],
            scopes_supported: config.scopes_supported().to_vec(),
        }
    }

    /// Metadata path for a protected endpoint path.
    ///
    /// ```rust
    /// use mcp_resource_gate::oauth::ProtectedResourceMetadata;
    ///
    /// assert_eq!(
    ///     ProtectedResourceMetadata::well_known_path_for("/mcp"),
    ///     "/.well-known/oauth-protected-resource/mcp"
    /// );
    /// ```
    pub fn well_known_path_for(resource_path: &str) -> String {
        let suffix = resource_path.trim_end_matches('/');
        format!("{}{}", Self::WELL_KNOWN_PREFIX, suffix)
    }
}

/// Fetch the authorization server's metadata document as raw JSON.
///
/// The document is returned untouched so it can be forwarded verbatim.
pub async fn fetch_authorization_server_metadata(
    http: &reqwest::Client,
    url: &Url,
) -> crate::Result<serde_json::Value> {
    let document = http
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?
        .json::<serde_json::Value>()
        .await?;
    Ok(document)
}
