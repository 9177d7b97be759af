//! `WWW-Authenticate` challenge construction (RFC 6750 Section 3).
//!
//! Includes the `resource_metadata` parameter from RFC 9728 so clients can
//! find the Protected Resource Metadata document from a 401 alone.

use std::fmt;

use axum::http::HeaderValue;
use url::Url;

use super::scope::ScopeRequirement;

/// `error_description` sent with every `invalid_token` challenge.
pub const INVALID_TOKEN_DESCRIPTION: &str = "The access token is invalid or expired";

/// Bearer error codes from RFC 6750 Section 3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    InvalidToken,
    InsufficientScope,
}

impl BearerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            BearerError::InvalidToken => "invalid_token",
            BearerError::InsufficientScope => "insufficient_scope",
        }
    }
}

/// A single `Bearer` challenge.
///
/// Absent parameters are left out entirely, never rendered empty.
///
/// ```rust
/// use mcp_resource_gate::oauth::{BearerError, Challenge};
///
/// let challenge = Challenge::bearer("EpicMe")
///     .error(BearerError::InvalidToken)
///     .error_description("The access token is invalid or expired");
///
/// assert_eq!(
///     challenge.to_string(),
///     r#"Bearer realm="EpicMe", error="invalid_token", error_description="The access token is invalid or expired""#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    realm: String,
    error: Option<BearerError>,
    error_description: Option<String>,
    resource_metadata: Option<Url>,
    scope: Option<String>,
}

impl Challenge {
    /// A bare `Bearer realm="..."` challenge.
    pub fn bearer(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            error: None,
            error_description: None,
            resource_metadata: None,
            scope: None,
        }
    }

    /// Challenge for a request that carried no credentials at all.
    ///
    /// Carries no `error` parameter: the client has not tried to
    /// authenticate yet, so nothing was invalid.
    pub fn missing_token(realm: impl Into<String>, resource_metadata: Url) -> Self {
        Self::bearer(realm).resource_metadata(resource_metadata)
    }

    /// Challenge for a credential that was presented but is not valid.
    pub fn invalid_token(realm: impl Into<String>, resource_metadata: Url) -> Self {
        Self::bearer(realm)
            .error(BearerError::InvalidToken)
            .error_description(INVALID_TOKEN_DESCRIPTION)
            .resource_metadata(resource_metadata)
    }

    /// Challenge for a valid token that satisfies none of the combinations.
    ///
    /// The combinations go in `error_description` rather than a `scope`
    /// parameter: any single combination is enough, and a `scope` listing
    /// all of them would ask the client for more than it needs.
    pub fn insufficient_scope(realm: impl Into<String>, requirement: &ScopeRequirement) -> Self {
        Self::bearer(realm)
            .error(BearerError::InsufficientScope)
            .error_description(format!(
                "Any of the following combinations of scopes is valid: {}",
                requirement.describe()
            ))
    }

    pub fn error(mut self, error: BearerError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn error_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    pub fn resource_metadata(mut self, url: Url) -> Self {
        self.resource_metadata = Some(url);
        self
    }

    /// Add a `scope` hint.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn bearer_error(&self) -> Option<BearerError> {
        self.error
    }

    /// Encode as a header value.
    ///
    /// Falls back to the bare realm challenge if a parameter contains bytes
    /// that cannot appear in a header.
    pub fn to_header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.to_string()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not encode WWW-Authenticate header");
            HeaderValue::from_str(&format!("Bearer realm={}", quote(&self.realm)))
                .unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
        })
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = [
            Some(format!("realm={}", quote(&self.realm))),
            self.error.map(|e| format!("error={}", quote(e.as_str()))),
            self.error_description
                .as_deref()
                .map(|d| format!("error_description={}", quote(d))),
            self.resource_metadata
                .as_ref()
                .map(|url| format!("resource_metadata={}", url)),
            self.scope.as_deref().map(|s| format!("scope={}", quote(s))),
        ];

        let params: Vec<String> = params.into_iter().flatten().collect();
        write!(f, "Bearer {}", params.join(", "))
    }
}

/// Render an RFC 7230 quoted-string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_url() -> Url {
        "https://host:1234/.well-known/oauth-protected-resource/mcp"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_missing_token() {
        let header = Challenge::missing_token("EpicMe", metadata_url()).to_string();
        assert_eq!(
            header,
            "Bearer realm=\"EpicMe\", resource_metadata=https://host:1234/.well-known/oauth-protected-resource/mcp"
        );
        assert!(!header.contains("error="));
    }

    #[test]
    fn test_invalid_token() {
        let header = Challenge::invalid_token("EpicMe", metadata_url()).to_string();
        assert_eq!(
            header,
            "Bearer realm=\"EpicMe\", error=\"invalid_token\", \
             error_description=\"The access token is invalid or expired\", \
             resource_metadata=https://host:1234/.well-known/oauth-protected-resource/mcp"
        );
    }

    #[test]
    fn test_insufficient_scope() {
        let requirement = ScopeRequirement::any_single(["user:read", "entries:read"])
            .or(["tags:read", "tags:write"]);
        let challenge = Challenge::insufficient_scope("EpicMe", &requirement);
        assert_eq!(challenge.bearer_error(), Some(BearerError::InsufficientScope));
        assert_eq!(
            challenge.to_string(),
            "Bearer realm=\"EpicMe\", error=\"insufficient_scope\", \
             error_description=\"Any of the following combinations of scopes is valid: \
             user:read, entries:read, tags:read tags:write\""
        );
        assert!(!challenge.to_string().contains("scope=\""));
    }

    #[test]
    fn test_scope_hint_comes_last() {
        let header = Challenge::missing_token("EpicMe", metadata_url())
            .scope("user:read entries:read")
            .to_string();
        assert!(header.ends_with(", scope=\"user:read entries:read\""));
    }

    #[test]
    fn test_no_empty_segments() {
        let header = Challenge::bearer("EpicMe").to_string();
        assert_eq!(header, "Bearer realm=\"EpicMe\"");
        assert!(!header.ends_with(','));
        assert!(!header.contains(", ,"));
    }

    #[test]
    fn test_quoting() {
        let header = Challenge::bearer("Epic\"Me")
            .error_description("a\\b")
            .to_string();
        assert_eq!(
            header,
            "Bearer realm=\"Epic\\\"Me\", error_description=\"a\\\\b\""
        );
    }

    #[test]
    fn test_header_value_fallback() {
        let value = Challenge::bearer("EpicMe")
            .error_description("line\nbreak")
            .to_header_value();
        assert_eq!(value.to_str().unwrap(), "Bearer realm=\"EpicMe\"");
    }
}
