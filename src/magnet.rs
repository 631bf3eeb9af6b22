//! Magnet link parsing
//!
//! A [`MagnetLink`] keeps the exact URI string it was parsed from. That string is the
//! identity of the link: equality, hashing and the download ledger all use it.

use regex::Regex;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;
use url::Url;

/// Anchored pattern a feed candidate must match to be treated as a magnet link
#[allow(clippy::expect_used)]
static MAGNET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^magnet:\?xt=urn:btih:.*$").expect("magnet pattern is a valid regex")
});

/// Returns true if `candidate` looks like a BitTorrent magnet URI
///
/// The scheme literal is case-sensitive and the whole string must match.
pub fn is_magnet_candidate(candidate: &str) -> bool {
    MAGNET_RE.is_match(candidate)
}

/// A parsed magnet URI
#[derive(Clone, Debug)]
pub struct MagnetLink {
    uri: String,
    url: Url,
}

impl MagnetLink {
    /// Parse a magnet URI
    ///
    /// Fails if the string does not match the magnet pattern or is not a valid URI.
    pub fn parse(uri: &str) -> std::result::Result<Self, MagnetParseError> {
        if !is_magnet_candidate(uri) {
            return Err(MagnetParseError::NotMagnet(uri.to_string()));
        }
        let url = Url::parse(uri).map_err(|source| MagnetParseError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;
        Ok(Self {
            uri: uri.to_string(),
            url,
        })
    }

    /// The original URI string
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The human-readable name from the `dn` query parameter, if present
    pub fn display_name(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == "dn")
            .map(|(_, value)| value.into_owned())
    }

    /// The BitTorrent info hash from the `xt=urn:btih:` parameter
    pub fn info_hash(&self) -> Option<String> {
        self.url
            .query_pairs()
            .filter(|(key, _)| key == "xt")
            .find_map(|(_, value)| value.strip_prefix("urn:btih:").map(str::to_string))
            .filter(|hash| !hash.is_empty())
    }

    /// A short label for log lines: display name, else info hash, else the URI
    pub fn label(&self) -> String {
        self.display_name()
            .or_else(|| self.info_hash())
            .unwrap_or_else(|| self.uri.clone())
    }
}

impl PartialEq for MagnetLink {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for MagnetLink {}

impl Hash for MagnetLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl std::fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

impl std::str::FromStr for MagnetLink {
    type Err = MagnetParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for MagnetLink {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// Why a candidate string was not accepted as a magnet link
#[derive(Debug, thiserror::Error)]
pub enum MagnetParseError {
    /// The string does not match `magnet:?xt=urn:btih:...`
    #[error("not a magnet link: {0}")]
    NotMagnet(String),

    /// The string matched the pattern but is not a valid URI
    #[error("invalid magnet URI {uri}: {source}")]
    InvalidUri {
        /// The rejected candidate
        uri: String,
        /// The URI parser's complaint
        #[source]
        source: url::ParseError,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parses_magnet_and_keeps_original_string() {
        let uri = "magnet:?xt=urn:btih:ABC&dn=Movie";
        let link = MagnetLink::parse(uri).unwrap();

        assert_eq!(link.as_str(), uri);
        assert_eq!(link.to_string(), uri);
    }

    #[test]
    fn display_name_is_percent_decoded() {
        let link = MagnetLink::parse("magnet:?xt=urn:btih:ABC&dn=Big%20Movie+2024").unwrap();
        assert_eq!(link.display_name().as_deref(), Some("Big Movie 2024"));
    }

    #[test]
    fn display_name_absent_without_dn() {
        let link = MagnetLink::parse("magnet:?xt=urn:btih:ABC&tr=udp://tracker:80").unwrap();
        assert_eq!(link.display_name(), None);
    }

    #[test]
    fn info_hash_comes_from_xt() {
        let link = MagnetLink::parse("magnet:?xt=urn:btih:0123abcd&dn=x").unwrap();
        assert_eq!(link.info_hash().as_deref(), Some("0123abcd"));
        assert_eq!(link.label(), "x");
    }

    #[test]
    fn pattern_is_anchored_and_case_sensitive() {
        assert!(is_magnet_candidate("magnet:?xt=urn:btih:ABC"));
        assert!(!is_magnet_candidate("MAGNET:?xt=urn:btih:ABC"));
        assert!(!is_magnet_candidate(" magnet:?xt=urn:btih:ABC"));
        assert!(!is_magnet_candidate("magnet:?xt=urn:sha1:ABC"));
        assert!(!is_magnet_candidate("https://example.com/file.torrent"));
        assert!(!is_magnet_candidate("magnet:?xt=urn:btih:ABC\nsecond line"));
    }

    #[test]
    fn non_magnet_is_rejected() {
        let err = MagnetLink::parse("https://example.com/a.torrent").unwrap_err();
        assert!(matches!(err, MagnetParseError::NotMagnet(_)));
    }

    #[test]
    fn equality_and_hash_use_the_uri_string() {
        let a = MagnetLink::parse("magnet:?xt=urn:btih:ABC&dn=One").unwrap();
        let b = MagnetLink::parse("magnet:?xt=urn:btih:ABC&dn=One").unwrap();
        let c = MagnetLink::parse("magnet:?xt=urn:btih:ABC&dn=Two").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
