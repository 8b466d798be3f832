//! Web search over a Tavily-compatible `/search` endpoint.

use async_trait::async_trait;
use autoservice_shared::{AutoserviceError, Result, SearchConfig, read_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::{build_client, endpoint};

/// One search result snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Looks up a query on the web.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Return at most `max_results` hits. Zero hits is a success.
    ///
    /// Fails with [`AutoserviceError::SearchFailed`] on transport or API errors.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Tavily search client. Only exists when a credential is configured.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    url: Url,
    api_key: String,
}

impl TavilyClient {
    /// Build a client from config, or `None` when the key env var is unset.
    pub fn from_config(config: &SearchConfig) -> Result<Option<Self>> {
        match read_api_key(&config.api_key_env) {
            Some(key) => Ok(Some(Self::new(config, key)?)),
            None => {
                debug!(env = %config.api_key_env, "no search key, web search disabled");
                Ok(None)
            }
        }
    }

    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: endpoint(&config.base_url, "search")?,
            api_key,
        })
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    #[instrument(skip_all, fields(query = %query, max_results))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "basic",
            include_answer: false,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AutoserviceError::SearchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AutoserviceError::SearchFailed(format!("HTTP {status}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AutoserviceError::SearchFailed(format!("invalid response: {e}")))?;

        let mut hits = parsed.results;
        hits.truncate(max_results);
        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}
