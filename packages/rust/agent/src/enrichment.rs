//! Enrichment stage: look up candidate workshops in the local database and
//! on the web.
//!
//! Both lookups run concurrently and never fail the invocation: every
//! outcome, including errors, becomes a tagged result that renders to a
//! marker string for the synthesis prompt.

use async_trait::async_trait;
use autoservice_llm::{SearchHit, WebSearch};
use autoservice_shared::{AutoserviceError, Result, WorkshopSummary};
use autoservice_storage::Storage;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::classification::Classification;

/// Maximum number of unfiltered workshops listed when nothing matches.
const FALLBACK_LIMIT: usize = 10;

/// Maximum characters of a web snippet carried into the prompt.
const SNIPPET_MAX_CHARS: usize = 500;

pub const NO_WORKSHOPS_MARKER: &str = "No workshops are registered in our database.";
pub const FALLBACK_LABEL: &str = "No exact match. All available workshops:";
pub const WEB_UNAVAILABLE_MARKER: &str = "Web search is not available.";

// ---------------------------------------------------------------------------
// Directory seam
// ---------------------------------------------------------------------------

/// Read-only source of workshops for the local lookup.
#[async_trait]
pub trait WorkshopDirectory: Send + Sync {
    async fn workshops_with_order_counts(&self) -> Result<Vec<WorkshopSummary>>;
}

#[async_trait]
impl WorkshopDirectory for Storage {
    async fn workshops_with_order_counts(&self) -> Result<Vec<WorkshopSummary>> {
        self.list_workshops_with_order_counts().await
    }
}

/// Directory that opens a read-only handle only when workshops are
/// requested, so a store that cannot be reached fails the local lookup
/// instead of the whole invocation.
pub struct ReadOnlyDirectory<'a> {
    storage: &'a Storage,
}

impl<'a> ReadOnlyDirectory<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl WorkshopDirectory for ReadOnlyDirectory<'_> {
    async fn workshops_with_order_counts(&self) -> Result<Vec<WorkshopSummary>> {
        let handle = self.storage.connect_readonly().await?;
        handle.list_workshops_with_order_counts().await
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    LocalStore,
    Web,
}

/// A workshop worth mentioning to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkshopCandidate {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    /// Service orders on record; only known for local workshops.
    pub order_count: Option<usize>,
    /// Database id for local workshops, page URL for web hits.
    pub source_id: String,
    /// Snippet text for web hits.
    pub details: Option<String>,
    pub source: CandidateSource,
}

impl WorkshopCandidate {
    fn from_local(summary: &WorkshopSummary) -> Self {
        let w = &summary.workshop;
        Self {
            name: w.name.clone(),
            address: w.address.clone(),
            postal_code: w.postal_code.clone(),
            city: w.city.clone(),
            order_count: Some(summary.order_count),
            source_id: w.id.to_string(),
            details: None,
            source: CandidateSource::LocalStore,
        }
    }

    fn from_hit(hit: SearchHit) -> Self {
        Self {
            name: hit.title,
            address: String::new(),
            postal_code: String::new(),
            city: String::new(),
            order_count: None,
            source_id: hit.url,
            details: Some(truncate_chars(&hit.content, SNIPPET_MAX_CHARS)),
            source: CandidateSource::Web,
        }
    }
}

/// Outcome of the local database lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LocalLookup {
    /// Workshops whose city, postal code or name appears in the request.
    Matched(Vec<WorkshopCandidate>),
    /// Nothing matched; the first few workshops instead.
    Fallback(Vec<WorkshopCandidate>),
    /// The database holds no workshops at all.
    Empty,
    /// The database could not be read.
    Failed(String),
}

impl LocalLookup {
    pub fn candidates(&self) -> &[WorkshopCandidate] {
        match self {
            Self::Matched(c) | Self::Fallback(c) => c,
            Self::Empty | Self::Failed(_) => &[],
        }
    }

    /// Text for the synthesis prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Matched(candidates) => {
                let mut out =
                    format!("Matching workshops in our database ({}):\n", candidates.len());
                render_local(&mut out, candidates);
                out
            }
            Self::Fallback(candidates) => {
                let mut out = format!("{FALLBACK_LABEL}\n");
                render_local(&mut out, candidates);
                out
            }
            Self::Empty => NO_WORKSHOPS_MARKER.to_string(),
            Self::Failed(reason) => format!("Database lookup failed: {reason}"),
        }
    }
}

/// Outcome of the web lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebLookup {
    Results {
        query: String,
        hits: Vec<WorkshopCandidate>,
    },
    /// No search credential is configured.
    Unavailable,
    Failed { reason: String },
}

impl WebLookup {
    pub fn candidates(&self) -> &[WorkshopCandidate] {
        match self {
            Self::Results { hits, .. } => hits,
            Self::Unavailable | Self::Failed { .. } => &[],
        }
    }

    /// Text for the synthesis prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Results { query, hits } if hits.is_empty() => {
                format!("Web search for '{query}' returned no results.")
            }
            Self::Results { query, hits } => {
                let mut out = format!("Web search for '{query}':\n");
                for hit in hits {
                    out.push_str(&format!("- {} ({})\n", hit.name, hit.source_id));
                    if let Some(details) = &hit.details {
                        out.push_str(&format!("  {details}\n"));
                    }
                }
                out
            }
            Self::Unavailable => WEB_UNAVAILABLE_MARKER.to_string(),
            Self::Failed { reason } => AutoserviceError::SearchFailed(reason.clone()).to_string(),
        }
    }
}

/// Both lookup outcomes of one invocation, kept side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentResult {
    pub local: LocalLookup,
    pub web: WebLookup,
}

impl EnrichmentResult {
    /// Every candidate from both sources, local first.
    pub fn candidates(&self) -> impl Iterator<Item = &WorkshopCandidate> {
        self.local.candidates().iter().chain(self.web.candidates())
    }
}

// ---------------------------------------------------------------------------
// Stage entry point
// ---------------------------------------------------------------------------

/// Run the local and web lookups concurrently.
#[instrument(skip_all, fields(location = classification.location.as_deref().unwrap_or("-")))]
pub async fn enrich(
    query: &str,
    classification: &Classification,
    directory: &dyn WorkshopDirectory,
    search: Option<&dyn WebSearch>,
    max_results: usize,
) -> EnrichmentResult {
    let (local, web) = tokio::join!(
        local_lookup(directory, query, classification),
        web_lookup(search, query, classification, max_results),
    );

    info!(
        local = local.candidates().len(),
        web = web.candidates().len(),
        "enrichment complete"
    );

    EnrichmentResult { local, web }
}

/// Filter stored workshops against the request and classification text.
pub async fn local_lookup(
    directory: &dyn WorkshopDirectory,
    query: &str,
    classification: &Classification,
) -> LocalLookup {
    let workshops = match directory.workshops_with_order_counts().await {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "workshop lookup failed");
            return LocalLookup::Failed(e.to_string());
        }
    };

    if workshops.is_empty() {
        return LocalLookup::Empty;
    }

    let haystacks = [query.to_lowercase(), classification.raw.to_lowercase()];
    let matched: Vec<WorkshopCandidate> = workshops
        .iter()
        .filter(|s| workshop_matches(s, &haystacks))
        .map(WorkshopCandidate::from_local)
        .collect();

    if matched.is_empty() {
        LocalLookup::Fallback(
            workshops
                .iter()
                .take(FALLBACK_LIMIT)
                .map(WorkshopCandidate::from_local)
                .collect(),
        )
    } else {
        LocalLookup::Matched(matched)
    }
}

/// Search the web for workshops near the extracted location.
pub async fn web_lookup(
    search: Option<&dyn WebSearch>,
    query: &str,
    classification: &Classification,
    max_results: usize,
) -> WebLookup {
    let Some(search) = search else {
        return lookup_error(AutoserviceError::SearchUnavailable);
    };

    let search_query = build_search_query(query, classification);
    match search.search(&search_query, max_results).await {
        Ok(hits) => WebLookup::Results {
            query: search_query,
            hits: hits
                .into_iter()
                .take(max_results)
                .map(WorkshopCandidate::from_hit)
                .collect(),
        },
        Err(e) => {
            warn!(error = %e, "web search failed");
            lookup_error(e)
        }
    }
}

fn lookup_error(err: AutoserviceError) -> WebLookup {
    match err {
        AutoserviceError::SearchUnavailable => WebLookup::Unavailable,
        AutoserviceError::SearchFailed(reason) => WebLookup::Failed { reason },
        other => WebLookup::Failed {
            reason: other.to_string(),
        },
    }
}

/// Search string for the web lookup.
pub fn build_search_query(query: &str, classification: &Classification) -> String {
    match classification.location.as_deref() {
        Some(location) => {
            format!("auto workshop car repair service {location} reviews recommendation")
        }
        None => format!("auto workshop {}", query.trim()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether any non-empty identifying field occurs in any haystack.
fn workshop_matches(summary: &WorkshopSummary, haystacks: &[String]) -> bool {
    let w = &summary.workshop;
    [&w.city, &w.postal_code, &w.name]
        .into_iter()
        .map(|field| field.trim().to_lowercase())
        .filter(|field| !field.is_empty())
        .any(|field| haystacks.iter().any(|h| h.contains(&field)))
}

fn render_local(out: &mut String, candidates: &[WorkshopCandidate]) {
    for c in candidates {
        out.push_str(&format!("- {} (ID {})\n", c.name, c.source_id));
        out.push_str(&format!("  {}, {} {}\n", c.address, c.postal_code, c.city));
        out.push_str(&format!("  Service orders: {}\n", c.order_count.unwrap_or(0)));
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
