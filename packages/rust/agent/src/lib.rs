//! AI-assist layer for the vehicle-service backend.
//!
//! The centerpiece is the [`WorkshopAgent`]:
//! 1. Classification: one completion call decides whether the message is a
//!    workshop search and extracts location and other parameters
//! 2. Enrichment (routed messages only): local database and web lookups,
//!    run concurrently
//! 3. Synthesis: one completion call writes the answer from both lookups
//!
//! Alongside it live the simpler [`direct_chat`] and [`intake_order`] flows.

pub mod chat;
pub mod classification;
pub mod enrichment;
pub mod intake;
pub mod pipeline;
pub mod synthesis;

#[cfg(test)]
mod testing;

pub use chat::{agent_chat, direct_chat};
pub use classification::{Classification, Intent, ParseMode, classify, parse_classification};
pub use enrichment::{
    CandidateSource, EnrichmentResult, LocalLookup, ReadOnlyDirectory, WebLookup,
    WorkshopCandidate, WorkshopDirectory, enrich,
};
pub use intake::{MISSING_ID_REPLY, OrderIntakeRequest, intake_order};
pub use pipeline::{
    AgentProgress, AgentRun, AgentState, SilentProgress, WorkshopAgent, run_workshop_agent,
};
pub use synthesis::{NOT_APPLICABLE, synthesize};
