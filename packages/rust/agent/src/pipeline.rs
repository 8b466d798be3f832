//! Workshop agent orchestrator: classification, then enrichment when
//! routed, then synthesis.

use std::sync::Arc;
use std::time::Instant;

use autoservice_llm::{CompletionClient, WebSearch};
use autoservice_shared::{AutoserviceError, CompletionConfig, Result, SearchConfig};
use autoservice_storage::Storage;
use serde::Serialize;
use tracing::{info, instrument};

use crate::classification::{self, Classification};
use crate::enrichment::{self, EnrichmentResult, ReadOnlyDirectory, WorkshopDirectory};
use crate::synthesis;

/// States visited by one invocation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Start,
    Classified,
    /// Lookups ran.
    Enriched,
    /// Lookups were skipped because the request was not routed.
    Skipped,
    Synthesized,
    Done,
}

/// Result of one agent invocation.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub answer: String,
    pub trace: Vec<AgentState>,
    pub classification: Classification,
    /// `None` when enrichment was skipped.
    pub enrichment: Option<EnrichmentResult>,
}

/// Progress callback for agent invocations.
pub trait AgentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the answer is ready.
    fn done(&self, run: &AgentRun);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl AgentProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _run: &AgentRun) {}
}

/// The two-stage workshop search agent.
///
/// Holds no per-request state; one instance serves any number of
/// concurrent invocations.
#[derive(Clone)]
pub struct WorkshopAgent {
    completion: Arc<dyn CompletionClient>,
    search: Option<Arc<dyn WebSearch>>,
    temperature: f32,
    max_results: usize,
}

impl WorkshopAgent {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        search: Option<Arc<dyn WebSearch>>,
        completion_config: &CompletionConfig,
        search_config: &SearchConfig,
    ) -> Self {
        Self {
            completion,
            search,
            temperature: completion_config.agent_temperature,
            max_results: search_config.max_results,
        }
    }

    /// Whether web search is configured.
    pub fn has_web_search(&self) -> bool {
        self.search.is_some()
    }

    /// Run one invocation against `directory`.
    ///
    /// Any stage error ends the invocation; there is no partial answer.
    #[instrument(skip_all, fields(query_chars = query.len()))]
    pub async fn run(
        &self,
        query: &str,
        directory: &dyn WorkshopDirectory,
        progress: &dyn AgentProgress,
    ) -> Result<AgentRun> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AutoserviceError::validation("message must not be empty"));
        }

        let start = Instant::now();
        let mut trace = vec![AgentState::Start];

        // --- Classification ---
        progress.phase("Classifying request");
        let classification =
            classification::classify(self.completion.as_ref(), query, self.temperature).await?;
        trace.push(AgentState::Classified);

        // --- Enrichment (routed only) ---
        let enrichment = if classification.should_route {
            progress.phase("Searching workshops");
            let result = enrichment::enrich(
                query,
                &classification,
                directory,
                self.search.as_deref(),
                self.max_results,
            )
            .await;
            trace.push(AgentState::Enriched);
            Some(result)
        } else {
            info!("request not routed, skipping workshop search");
            trace.push(AgentState::Skipped);
            None
        };

        // --- Synthesis ---
        progress.phase("Writing answer");
        let answer = synthesis::synthesize(
            self.completion.as_ref(),
            &classification,
            query,
            enrichment.as_ref(),
            self.temperature,
        )
        .await?;
        trace.push(AgentState::Synthesized);
        trace.push(AgentState::Done);

        info!(
            routed = enrichment.is_some(),
            answer_chars = answer.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "workshop agent complete"
        );

        let run = AgentRun {
            answer,
            trace,
            classification,
            enrichment,
        };
        progress.done(&run);
        Ok(run)
    }
}

/// Answer one message, reading workshops through a read-only handle that is
/// opened only if the local lookup runs.
pub async fn run_workshop_agent(
    agent: &WorkshopAgent,
    storage: &Storage,
    query: &str,
    progress: &dyn AgentProgress,
) -> Result<String> {
    let directory = ReadOnlyDirectory::new(storage);
    let run = agent.run(query, &directory, progress).await?;
    Ok(run.answer)
}
