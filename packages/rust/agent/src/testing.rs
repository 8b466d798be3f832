//! Stub and spy collaborators for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use autoservice_llm::{CompletionClient, SearchHit, WebSearch};
use autoservice_shared::{AutoserviceError, Result, Workshop, WorkshopSummary};

use crate::enrichment::WorkshopDirectory;

/// Completion client that replays canned replies and records every prompt.
pub(crate) struct StubCompletion {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl StubCompletion {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(AutoserviceError::completion("stub failure"));
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AutoserviceError::completion("no canned reply left"))
    }
}

/// Workshop directory that counts calls and serves a fixed list.
pub(crate) struct SpyDirectory {
    workshops: Vec<WorkshopSummary>,
    fail: bool,
    calls: AtomicUsize,
}

impl SpyDirectory {
    pub(crate) fn new(workshops: Vec<WorkshopSummary>) -> Self {
        Self {
            workshops,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            workshops: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkshopDirectory for SpyDirectory {
    async fn workshops_with_order_counts(&self) -> Result<Vec<WorkshopSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AutoserviceError::storage("database is locked"));
        }
        Ok(self.workshops.clone())
    }
}

/// Web search that records queries and serves fixed hits.
pub(crate) struct SpySearch {
    hits: Vec<SearchHit>,
    fail: bool,
    queries: Mutex<Vec<(String, usize)>>,
}

impl SpySearch {
    pub(crate) fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            hits: Vec::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for SpySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        if self.fail {
            return Err(AutoserviceError::SearchFailed("connection reset".into()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

pub(crate) fn summary(
    id: i64,
    name: &str,
    postal_code: &str,
    city: &str,
    orders: usize,
) -> WorkshopSummary {
    WorkshopSummary {
        workshop: Workshop {
            id,
            name: name.into(),
            address: "Hauptstraße 1".into(),
            postal_code: postal_code.into(),
            city: city.into(),
        },
        order_count: orders,
    }
}

pub(crate) fn hit(title: &str) -> SearchHit {
    SearchHit {
        title: title.into(),
        url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        content: format!("{title} has excellent reviews."),
    }
}

/// Fresh database in a temp file.
pub(crate) async fn temp_storage() -> autoservice_storage::Storage {
    let path = std::env::temp_dir().join(format!("as_agent_test_{}.db", uuid::Uuid::now_v7()));
    autoservice_storage::Storage::open(&path)
        .await
        .expect("open test db")
}
