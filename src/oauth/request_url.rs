//! Reconstruct the absolute URL a client used to reach this server.
//!
//! Discovery documents and `resource_metadata` links are derived from the
//! current request rather than a configured host, so the same binary serves
//! correct URLs behind any hostname, port or reverse proxy.

use axum::http::{HeaderMap, Uri, header};
use url::Url;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Rebuild the absolute request URL.
///
/// Scheme: the request URI's own, else `X-Forwarded-Proto`, else
/// `default_scheme`. Authority: the request URI's own, else
/// `X-Forwarded-Host`, else `Host`. Returns `None` when no authority is known.
pub fn request_url(uri: &Uri, headers: &HeaderMap, default_scheme: &str) -> Option<Url> {
    let scheme = uri
        .scheme_str()
        .map(str::to_string)
        .or_else(|| first_forwarded(headers, X_FORWARDED_PROTO))
        .filter(|s| s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https"))
        .unwrap_or_else(|| default_scheme.to_string());

    let authority = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| first_forwarded(headers, X_FORWARDED_HOST))
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .filter(|a| !a.is_empty())?;

    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    Url::parse(&format!("{}://{}{}", scheme, authority, path_and_query)).ok()
}

/// Replace the path of `url`, dropping query and fragment.
///
/// ```rust
/// use mcp_resource_gate::oauth::request_url::with_path;
///
/// let url = "https://host:1234/anything?x=1".parse().unwrap();
/// assert_eq!(with_path(&url, "/mcp").as_str(), "https://host:1234/mcp");
/// ```
pub fn with_path(url: &Url, path: &str) -> Url {
    let mut url = url.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn first_forwarded(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
