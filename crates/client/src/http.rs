//! Shared HTTP client construction.

use std::time::Duration;

const MAX_REDIRECTS: usize = 5;

/// Build the reqwest client used for sitemap fetching.
///
/// An empty `user_agent` keeps reqwest's default.
pub fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .use_rustls_tls()
        .gzip(true);

    if !user_agent.is_empty() {
        builder = builder.user_agent(user_agent.to_string());
    }

    // Building only fails on TLS backend misconfiguration; fall back to
    // the stock client rather than refusing to boot.
    builder.build().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        let _client = build_client("mirage/0.1", Duration::from_secs(20));
        let _client = build_client("", Duration::from_secs(20));
    }
}
