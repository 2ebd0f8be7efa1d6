use crate::{
    memory::SessionKey,
    types::{AppError, ChatRequest, ChatResponse, Result, DEFAULT_USER_ID},
    AppState,
};
use axum::{extract::State, Json};
use tracing::info;

/// Chat with the inventory assistant
///
/// Stock commands, approval answers and questions all go through this one
/// endpoint. The session's memory stays locked for the whole turn, so two
/// messages in the same session are handled one after the other.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Chat response", body = ChatResponse),
        (status = 400, description = "Invalid input")
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AppError::InvalidInput("message must not be empty".to_string()));
    }
    if payload.session_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "session_id must not be empty".to_string(),
        ));
    }

    let user_id = payload
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_USER_ID);
    let key = SessionKey::new(user_id, payload.session_id.clone());

    let mut memory = state.sessions.checkout(&key).await;
    let reply = state
        .agent()
        .handle(&mut memory, message, payload.context.as_ref())
        .await?;

    info!(
        "Chat turn for {}: intent={} degraded={}",
        key, reply.intent, reply.degraded
    );

    let open_orders = memory.open_orders();
    Ok(Json(ChatResponse {
        response: reply.text,
        session_id: payload.session_id,
        intent: reply.intent,
        degraded: reply.degraded,
        pending_approvals: memory.pending_approvals.clone(),
        pending_orders: (!open_orders.is_empty()).then_some(open_orders),
        purchase_order: reply.purchase_order,
    }))
}
