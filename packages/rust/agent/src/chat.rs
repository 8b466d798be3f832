//! Chat entry points that log every exchange as an interaction.

use autoservice_llm::CompletionClient;
use autoservice_shared::{AutoserviceError, Result};
use autoservice_storage::Storage;
use tracing::instrument;

use crate::pipeline::{AgentProgress, WorkshopAgent, run_workshop_agent};

/// Send `message` straight to the completion backend and log the reply.
#[instrument(skip_all, fields(message_chars = message.len()))]
pub async fn direct_chat(
    completion: &dyn CompletionClient,
    storage: &Storage,
    message: &str,
    temperature: f32,
) -> Result<String> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AutoserviceError::validation("message must not be empty"));
    }

    let answer = completion.complete(message, temperature).await?;
    storage.insert_interaction(message, &answer, None).await?;
    Ok(answer)
}

/// Answer `message` with the workshop agent and log the reply.
///
/// The lookup and the log entry each open their own handle on `storage`.
#[instrument(skip_all, fields(message_chars = message.len()))]
pub async fn agent_chat(
    agent: &WorkshopAgent,
    storage: &Storage,
    message: &str,
    progress: &dyn AgentProgress,
) -> Result<String> {
    let answer = run_workshop_agent(agent, storage, message, progress).await?;
    storage
        .connect()
        .await?
        .insert_interaction(message.trim(), &answer, None)
        .await?;
    Ok(answer)
}
