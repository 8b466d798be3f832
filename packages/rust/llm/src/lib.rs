//! HTTP clients for the external AI services.
//!
//! - [`CompletionClient`] / [`OpenAiClient`]: prompt in, generated text out
//! - [`WebSearch`] / [`TavilyClient`]: query in, a few text snippets out
//!
//! Both traits are object-safe so callers can hold `Arc<dyn ...>` and swap in
//! stubs under test.

mod completion;
mod search;

pub use completion::{CompletionClient, OpenAiClient};
pub use search::{SearchHit, TavilyClient, WebSearch};

use std::time::Duration;

use autoservice_shared::{AutoserviceError, Result};
use reqwest::Client;
use url::Url;

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("autoservice/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the given request timeout.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AutoserviceError::config(format!("failed to build HTTP client: {e}")))
}

/// Join `path` onto a configured base URL, keeping any path prefix
/// (`https://api.openai.com/v1` + `chat/completions`).
fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let mut base = base_url.trim_end_matches('/').to_string();
    base.push('/');
    let base = Url::parse(&base)
        .map_err(|e| AutoserviceError::config(format!("invalid base URL '{base_url}': {e}")))?;
    base.join(path)
        .map_err(|e| AutoserviceError::config(format!("invalid endpoint '{path}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_path_prefix() {
        let url = endpoint("https://api.openai.com/v1", "chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

        let url = endpoint("https://api.openai.com/v1/", "chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn endpoint_on_bare_host() {
        let url = endpoint("https://api.tavily.com", "search").unwrap();
        assert_eq!(url.as_str(), "https://api.tavily.com/search");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(endpoint("not a url", "search").is_err());
    }
}
