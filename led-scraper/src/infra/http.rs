use reqwest::redirect::Policy;

/// Desktop-browser identity used for all landing/detail page requests. The
/// source site serves different markup to unknown agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const SITE_REFERER: &str = "https://lu.ma/";

/// Shared client for page scraping: browser UA, redirects followed. Per-stage
/// timeouts are set on each request rather than on the client.
pub fn browser_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .redirect(Policy::limited(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
