//! Cache key derivation from request URLs.

use sha2::{Digest, Sha256};
use url::Url;

use super::{CachePath, PAGE_PREFIX};
use crate::Error;

/// Derived storage identity of a page: the host bucket and the content
/// hash of the original URL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageKey {
    host_key: String,
    hash: String,
}

impl PageKey {
    /// Derive the cache identity for a URL.
    ///
    /// Input lacking a `scheme://` is prefixed with a placeholder scheme
    /// solely to enable parsing; the hash always covers the original
    /// string, so fingerprints stay stable for callers that omit the
    /// scheme.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` when the input cannot be parsed as an
    /// absolute URL or its host is empty.
    pub fn derive(input: &str) -> Result<Self, Error> {
        let parsed = if input.contains("://") {
            Url::parse(input)
        } else {
            Url::parse(&format!("dummy://{input}"))
        }
        .map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidUrl(format!("{input}: empty host")))?;

        let host_key = match parsed.port() {
            Some(port) => format!("{host}_{port}"),
            None => host.to_string(),
        };

        Ok(Self { host_key, hash: sha256_hex(input.as_bytes()) })
    }

    /// Host bucket name, `host` or `host_port`.
    pub fn host_key(&self) -> &str {
        &self.host_key
    }

    /// Lowercase hex SHA-256 of the original URL string.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Full cache path, `page/<host_key>/<hash>`.
    pub fn path(&self) -> CachePath {
        CachePath::new(PAGE_PREFIX, &self.host_key, &self.hash)
    }

    /// Path of the whole host bucket, `page/<host_key>`.
    pub fn host_path(&self) -> CachePath {
        CachePath::bucket(PAGE_PREFIX, &self.host_key)
    }
}

/// Lowercase hex SHA-256 fingerprint.
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = PageKey::derive("http://a.example/x").unwrap();
        let b = PageKey::derive("http://a.example/x").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.host_key(), "a.example");
        assert_eq!(a.path().as_str(), format!("page/a.example/{}", a.hash()));
    }

    #[test]
    fn test_hash_format() {
        let key = PageKey::derive("http://a.example/x").unwrap();
        assert_eq!(key.hash().len(), 64);
        assert!(key.hash().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_port_folding() {
        let key = PageKey::derive("http://a:81/x").unwrap();
        assert_eq!(key.host_key(), "a_81");
        assert!(key.path().as_str().starts_with("page/a_81/"));
    }

    #[test]
    fn test_schemeless_input_hashes_original() {
        let bare = PageKey::derive("a.example/x").unwrap();
        let schemed = PageKey::derive("http://a.example/x").unwrap();
        assert_eq!(bare.host_key(), "a.example");
        // The placeholder scheme must not leak into the fingerprint.
        assert_ne!(bare.hash(), schemed.hash());
        assert_eq!(bare.hash(), sha256_hex(b"a.example/x"));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(PageKey::derive(""), Err(Error::InvalidUrl(_))));
        assert!(matches!(PageKey::derive("http://"), Err(Error::InvalidUrl(_))));
        assert!(matches!(PageKey::derive(":::"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_distinct_urls_distinct_hashes() {
        let a = PageKey::derive("http://a.example/x").unwrap();
        let b = PageKey::derive("http://a.example/y").unwrap();
        assert_ne!(a.hash(), b.hash());
    }
}
