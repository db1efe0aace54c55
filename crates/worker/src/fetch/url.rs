//! URL helpers for origin checks and asset resolution.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty path")]
    Empty,

    #[error("path must be origin-relative: {0}")]
    NotRelative(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve an origin-relative path (with optional query) against `origin`.
///
/// The fragment is removed; the query string is kept as-is so it stays part
/// of the cache key.
pub fn resolve(origin: &Url, path_and_query: &str) -> Result<Url, UrlError> {
    let trimmed = path_and_query.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    if !trimmed.starts_with('/') || trimmed.starts_with("//") {
        return Err(UrlError::NotRelative(trimmed.to_string()));
    }

    let mut url = origin
        .join(trimmed)
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    url.set_fragment(None);

    Ok(url)
}

/// Whether two URLs share scheme, host and effective port.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://gym.example").unwrap()
    }

    #[test]
    fn test_resolve_basic() {
        let url = resolve(&origin(), "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://gym.example/index.html");
    }

    #[test]
    fn test_resolve_keeps_query_drops_fragment() {
        let url = resolve(&origin(), "/students?page=2#top").unwrap();
        assert_eq!(url.query(), Some("page=2"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_resolve_rejects_protocol_relative() {
        assert!(matches!(resolve(&origin(), "//evil.example/x"), Err(UrlError::NotRelative(_))));
        assert!(matches!(resolve(&origin(), "index.html"), Err(UrlError::NotRelative(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin_default_port() {
        let a = Url::parse("https://gym.example:443/a").unwrap();
        assert!(is_same_origin(&a, &origin()));
    }

    #[test]
    fn test_cross_origin() {
        assert!(!is_same_origin(&Url::parse("http://gym.example/").unwrap(), &origin()));
        assert!(!is_same_origin(&Url::parse("https://api.gym.example/").unwrap(), &origin()));
        assert!(!is_same_origin(&Url::parse("https://gym.example:8443/").unwrap(), &origin()));
    }
}
