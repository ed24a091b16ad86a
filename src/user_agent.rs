//! Shared User-Agent strings for outbound HTTP clients.
//!
//! Listing pages and document hosts are fetched with a browser User-Agent since
//! several exchange and investor-relations hosts refuse non-browser clients.
//! API traffic (LLM endpoint, result API) identifies the tool.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/concall";

/// Browser User-Agent for listing, document and transcript fetches.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for API requests (identifies the tool).
#[must_use]
pub(crate) fn default_api_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("concall/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_user_agent_identifies_tool() {
        let ua = default_api_user_agent();
        assert!(ua.starts_with("concall/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(PROJECT_UA_URL));
    }

    #[test]
    fn test_browser_user_agent_looks_like_browser() {
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
    }
}
