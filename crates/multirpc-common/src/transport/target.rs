use hyper::Uri;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::protocol::error::{MultirpcError, Result};

/// A server a call can be sent to.
///
/// Always an absolute `http://` or `https://` URL with a host, e.g.
/// `http://127.0.0.1:8080/RPC2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: String,
    uri: Uri,
}

impl Target {
    /// Parses and validates a target URL.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::InvalidArgument`] if the URL is missing the
    /// `http://` / `https://` prefix or does not parse as an absolute URI.
    pub fn parse(url: impl Into<String>) -> Result<Self> {
        let url = url.into();

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MultirpcError::InvalidArgument(format!(
                "target '{}' must start with http:// or https://",
                url
            )));
        }

        let uri: Uri = url.parse().map_err(|e| {
            MultirpcError::InvalidArgument(format!("target '{}' is not a valid URL: {}", url, e))
        })?;

        if uri.host().map_or(true, str::is_empty) {
            return Err(MultirpcError::InvalidArgument(format!(
                "target '{}' has no host",
                url
            )));
        }

        Ok(Self { url, uri })
    }

    /// Parses a list of URLs, failing on the first invalid one.
    pub fn parse_all<I, S>(urls: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter().map(Self::parse).collect()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn is_https(&self) -> bool {
        self.uri.scheme_str() == Some("https")
    }
}

impl FromStr for Target {
    type Err = MultirpcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_target() {
        let target = Target::parse("http://127.0.0.1:8080/RPC2").unwrap();
        assert_eq!(target.url(), "http://127.0.0.1:8080/RPC2");
        assert_eq!(target.uri().port_u16(), Some(8080));
        assert!(!target.is_https());
    }

    #[test]
    fn test_parse_https_target() {
        let target: Target = "https://example.com/api".parse().unwrap();
        assert!(target.is_https());
        assert_eq!(target.to_string(), "https://example.com/api");
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        let err = Target::parse("127.0.0.1:8080").unwrap_err();
        assert!(err.to_string().contains("must start with http:// or https://"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Target::parse("http://exa mple.com").is_err());
        assert!(Target::parse("http://").is_err());
    }

    #[test]
    fn test_parse_all_stops_at_first_invalid() {
        let ok = Target::parse_all(["http://127.0.0.1:1", "http://127.0.0.1:2"]).unwrap();
        assert_eq!(ok.len(), 2);

        let err = Target::parse_all(["http://127.0.0.1:1", "ftp://127.0.0.1:2"]).unwrap_err();
        assert!(err.to_string().contains("ftp://127.0.0.1:2"));
    }

    #[test]
    fn test_serializes_as_url_string() {
        let target = Target::parse("http://127.0.0.1:9001").unwrap();
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            serde_json::json!("http://127.0.0.1:9001")
        );
    }
}
