//! AI-assist routes: order intake, direct chat and the workshop agent.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use autoservice_agent::{OrderIntakeRequest, SilentProgress, agent_chat, direct_chat, intake_order};
use autoservice_shared::{AgentInteraction, AutoserviceError};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{ASSISTANT_UNAVAILABLE, ApiError, ApiResult};

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

pub(crate) fn assist_routes() -> Router<AppState> {
    Router::new()
        .route("/ki/auftrag", post(create_order_from_message))
        .route("/openai/chat", post(openai_chat))
        .route("/agent/chat", post(workshop_agent_chat))
}

async fn create_order_from_message(
    State(state): State<AppState>,
    Json(body): Json<OrderIntakeRequest>,
) -> ApiResult<Json<AgentInteraction>> {
    let db = state.db().await?;
    Ok(Json(intake_order(&db, &body).await?))
}

async fn openai_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let db = state.db().await?;
    let response = direct_chat(
        state.completion.as_ref(),
        &db,
        &body.message,
        state.chat_temperature,
    )
    .await?;
    Ok(Json(ChatResponse { response }))
}

async fn workshop_agent_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let response = agent_chat(&state.agent, &state.storage, &body.message, &SilentProgress)
        .await
        .map_err(|err| match err {
            AutoserviceError::CompletionUnavailable(_) => {
                ApiError::masked(err, ASSISTANT_UNAVAILABLE)
            }
            other => ApiError::from(other),
        })?;
    Ok(Json(ChatResponse { response }))
}
