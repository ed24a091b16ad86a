//! HTTP client construction shared by every outbound boundary.
//!
//! Each boundary (document fetch, transcript provider, LLM endpoint, result
//! API, listing site) owns its own `reqwest::Client` so its timeout is fixed at
//! construction. Clients are built once and reused for connection pooling.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder};
use tracing::instrument;

/// Default connect timeout for all clients (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Document fetch timeout (60 seconds for the whole transfer).
pub const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Transcript provider timeout.
pub const TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// LLM call timeout.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Result API timeout.
pub const API_SINK_TIMEOUT: Duration = Duration::from_secs(15);

/// Listing site timeout (login and listing pages are slow).
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(120);

/// Builds a client with the given total timeout and User-Agent.
///
/// # Errors
///
/// Returns the reqwest builder error if TLS or proxy setup fails.
#[instrument(level = "debug", skip(cookie_jar))]
pub fn build_client(
    timeout: Duration,
    user_agent: &str,
    cookie_jar: Option<Arc<Jar>>,
) -> Result<Client, reqwest::Error> {
    base_client_builder(timeout, user_agent, cookie_jar).build()
}

fn base_client_builder(
    timeout: Duration,
    user_agent: &str,
    cookie_jar: Option<Arc<Jar>>,
) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .gzip(true)
        .user_agent(user_agent);
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    builder
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_and_without_jar() {
        assert!(build_client(DOCUMENT_TIMEOUT, "test-agent", None).is_ok());
        let jar = Arc::new(Jar::default());
        assert!(build_client(LISTING_TIMEOUT, "test-agent", Some(jar)).is_ok());
    }

    #[test]
    fn test_boundary_timeouts() {
        assert_eq!(DOCUMENT_TIMEOUT, Duration::from_secs(60));
        assert_eq!(LLM_TIMEOUT, Duration::from_secs(30));
        assert_eq!(API_SINK_TIMEOUT, Duration::from_secs(15));
    }
}
