//! Sitemap fetching and parsing.
//!
//! The orchestrator only cares about the sequence of page URLs a sitemap
//! names. Sitemap indexes are followed one level deep, which covers the
//! common `sitemap_index.xml -> sitemap-N.xml` layout without risking
//! unbounded recursion.

use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("sitemap fetch failed: {0}")]
    Fetch(String),

    #[error("sitemap url is not absolute: {0}")]
    InvalidUrl(String),
}

/// Split sitemap XML into page URLs and nested sitemap URLs.
pub fn parse_entries(xml: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut urls = Vec::new();
    let mut nested = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    nested.push(url.to_string());
                }
            }
            _ => {}
        }
    }

    (urls, nested)
}

/// Validate that a sitemap URL is absolute with a scheme and a host.
pub fn validate_sitemap_url(sitemap_url: &str) -> Result<(), SitemapError> {
    let parsed = url::Url::parse(sitemap_url).map_err(|_| SitemapError::InvalidUrl(sitemap_url.to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(SitemapError::InvalidUrl(sitemap_url.to_string()));
    }
    Ok(())
}

/// Fetch a sitemap and return the page URLs it names, following one level
/// of sitemap-index indirection.
pub async fn fetch_entries(http: &reqwest::Client, sitemap_url: &str) -> Result<Vec<String>, SitemapError> {
    validate_sitemap_url(sitemap_url)?;

    let xml = fetch_xml(http, sitemap_url).await?;
    let (mut urls, nested) = parse_entries(&xml);

    for nested_url in nested {
        match fetch_xml(http, &nested_url).await {
            Ok(xml) => {
                let (entries, _) = parse_entries(&xml);
                urls.extend(entries);
            }
            Err(err) => {
                tracing::warn!(sitemap = %nested_url, error = %err, "skipping nested sitemap");
            }
        }
    }

    Ok(urls)
}

async fn fetch_xml(http: &reqwest::Client, sitemap_url: &str) -> Result<Vec<u8>, SitemapError> {
    let response = http
        .get(sitemap_url)
        .send()
        .await
        .map_err(|e| SitemapError::Fetch(format!("{sitemap_url}: {e}")))?;

    if !response.status().is_success() {
        return Err(SitemapError::Fetch(format!("{sitemap_url}: status {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SitemapError::Fetch(format!("{sitemap_url}: {e}")))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>http://example.test/</loc></url>
            <url><loc>http://example.test/about</loc><priority>0.8</priority></url>
        </urlset>"#;

    const INDEX: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>http://example.test/sitemap-pages.xml</loc></sitemap>
        </sitemapindex>"#;

    #[test]
    fn test_parse_urlset() {
        let (urls, nested) = parse_entries(URLSET);
        assert_eq!(urls, vec!["http://example.test/", "http://example.test/about"]);
        assert!(nested.is_empty());
    }

    #[test]
    fn test_parse_index() {
        let (urls, nested) = parse_entries(INDEX);
        assert!(urls.is_empty());
        assert_eq!(nested, vec!["http://example.test/sitemap-pages.xml"]);
    }

    #[test]
    fn test_parse_garbage_yields_nothing() {
        let (urls, nested) = parse_entries(b"not xml at all");
        assert!(urls.is_empty());
        assert!(nested.is_empty());
    }

    #[test]
    fn test_validate_sitemap_url() {
        assert!(validate_sitemap_url("http://example.test/sitemap.xml").is_ok());
        assert!(validate_sitemap_url("https://example.test/sitemap.xml").is_ok());
        assert!(validate_sitemap_url("/sitemap.xml").is_err());
        assert!(validate_sitemap_url("example.test/sitemap.xml").is_err());
        assert!(validate_sitemap_url("").is_err());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_live_sitemap() {
        let http = reqwest::Client::new();
        let urls = fetch_entries(&http, "https://www.sitemaps.org/sitemap.xml").await.unwrap();
        assert!(!urls.is_empty());
    }
}
