//! Synthesis stage: turn the classification and lookup results into the
//! final answer.

use autoservice_llm::CompletionClient;
use autoservice_shared::Result;
use tracing::{debug, instrument};

use crate::classification::Classification;
use crate::enrichment::EnrichmentResult;

/// Placeholder for both lookup fields when no workshop search was run.
pub const NOT_APPLICABLE: &str = "Not applicable (no workshop search was performed).";

const SYNTHESIS_TEMPLATE: &str = "\
You are the answering stage of a vehicle-service assistant.

Classification of the request:
{classification}

ROUTED: {routed}

ORIGINAL REQUEST:
{query}

Workshops from our database:
{local}

Workshops from the web:
{web}

Instructions:
1. If ROUTED is NO, ignore the workshop sections and answer the original request directly.
2. If ROUTED is YES, recommend concrete workshops with name, address and a short reason, using only the two workshop sections above.
3. Keep the answer short and to the point.
4. Never mention API keys, configuration, missing services or other internal details; those are for developers only.

Answer in German, friendly and professional.
";

/// Build the synthesis prompt. `enrichment` is `None` when the request was
/// not routed; both workshop sections then carry [`NOT_APPLICABLE`].
///
/// The `ROUTED` line follows whether enrichment ran, not the raw FORWARD
/// label, which may disagree with the category or be missing entirely.
pub fn build_synthesis_prompt(
    classification: &Classification,
    query: &str,
    enrichment: Option<&EnrichmentResult>,
) -> String {
    let (local, web) = match enrichment {
        Some(result) => (result.local.render(), result.web.render()),
        None => (NOT_APPLICABLE.to_string(), NOT_APPLICABLE.to_string()),
    };

    let routed = if enrichment.is_some() { "YES" } else { "NO" };

    SYNTHESIS_TEMPLATE
        .replace("{classification}", classification.raw.trim())
        .replace("{routed}", routed)
        .replace("{query}", query)
        .replace("{local}", local.trim_end())
        .replace("{web}", web.trim_end())
}

/// Produce the final answer with exactly one completion call.
#[instrument(skip_all, fields(routed = enrichment.is_some()))]
pub async fn synthesize(
    completion: &dyn CompletionClient,
    classification: &Classification,
    query: &str,
    enrichment: Option<&EnrichmentResult>,
    temperature: f32,
) -> Result<String> {
    let prompt = build_synthesis_prompt(classification, query, enrichment);
    debug!(prompt_chars = prompt.len(), "synthesis prompt built");
    completion.complete(&prompt, temperature).await
}
