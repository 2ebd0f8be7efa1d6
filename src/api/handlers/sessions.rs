//! Session inspection and manager review of pending orders.

use crate::{
    events::DashboardEvent,
    memory::{ApprovalState, ConversationMemory, SessionKey},
    orders::PendingOrder,
    types::{ApiResponse, AppError, Result},
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Session summary returned in list endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub user_id: String,
    pub session_id: String,
    /// Chat turns, audit lines excluded
    pub turns: usize,
    pub approval_state: ApprovalState,
    /// Orders waiting for a manager
    pub open_orders: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&ConversationMemory> for SessionSummary {
    fn from(memory: &ConversationMemory) -> Self {
        Self {
            user_id: memory.key.user_id.clone(),
            session_id: memory.key.session_id.clone(),
            turns: memory.turns(),
            approval_state: memory.approval_state(),
            open_orders: memory.open_orders().len(),
            updated_at: memory.updated_at,
        }
    }
}

fn not_found(key: &SessionKey) -> AppError {
    AppError::NotFound(format!("Session {} not found", key))
}

/// List all sessions. Sessions in the middle of a turn are skipped rather
/// than waited for.
#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "Sessions", body = ApiResponse<Vec<SessionSummary>>)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<SessionSummary>>>> {
    let mut summaries = Vec::new();
    let mut busy = 0;
    for key in state.sessions.keys().await {
        match state.sessions.try_snapshot(&key) {
            Some(memory) => summaries.push(SessionSummary::from(&memory)),
            None => busy += 1,
        }
    }
    let message = if busy > 0 {
        format!("{} session(s), {} busy and not listed", summaries.len(), busy)
    } else {
        format!("{} session(s)", summaries.len())
    };
    Ok(Json(ApiResponse::success(summaries, message)))
}

/// Full memory of one session.
#[utoipa::path(
    get,
    path = "/api/sessions/{user_id}/{session_id}",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("session_id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session memory", body = ApiResponse<ConversationMemory>),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ConversationMemory>>> {
    let key = SessionKey::new(user_id, session_id);
    let memory = state
        .sessions
        .snapshot(&key)
        .await
        .ok_or_else(|| not_found(&key))?;
    Ok(Json(ApiResponse::success(memory, "Session found")))
}

/// Forget a session.
#[utoipa::path(
    delete,
    path = "/api/sessions/{user_id}/{session_id}",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("session_id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session deleted"),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SessionKey>>> {
    let key = SessionKey::new(user_id, session_id);
    if !state.sessions.remove(&key).await {
        return Err(not_found(&key));
    }
    info!("Session {} deleted", key);
    Ok(Json(ApiResponse::success(key, "Session deleted")))
}

/// Orders filed from rejected reorders in one session.
#[utoipa::path(
    get,
    path = "/api/sessions/{user_id}/{session_id}/orders",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("session_id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<Vec<PendingOrder>>),
        (status = 404, description = "Session not found")
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<PendingOrder>>>> {
    let key = SessionKey::new(user_id, session_id);
    let memory = state
        .sessions
        .snapshot(&key)
        .await
        .ok_or_else(|| not_found(&key))?;
    let message = format!("{} order(s)", memory.pending_orders.len());
    Ok(Json(ApiResponse::success(memory.pending_orders, message)))
}

#[derive(Clone, Copy)]
enum Decision {
    Approve,
    Reject,
}

async fn decide(
    state: &AppState,
    key: SessionKey,
    order_id: Uuid,
    decision: Decision,
) -> Result<PendingOrder> {
    let mut memory = state
        .sessions
        .checkout_existing(&key)
        .await
        .ok_or_else(|| not_found(&key))?;

    let order = memory
        .pending_orders
        .iter_mut()
        .find(|o| o.id == order_id)
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

    let now = Utc::now();
    let verb = match decision {
        Decision::Approve => {
            order.approve(now)?;
            "approved"
        }
        Decision::Reject => {
            order.reject(now)?;
            "rejected"
        }
    };
    let order = order.clone();

    memory.audit(format!(
        "Manager {} order {} ({} {} for {})",
        verb, order.id, order.quantity, order.item, order.location
    ));
    state.events.publish(DashboardEvent::order_changed(&order));
    info!("Order {} in session {} {}", order.id, key, verb);
    Ok(order)
}

/// Manager approves a pending order.
#[utoipa::path(
    post,
    path = "/api/sessions/{user_id}/{session_id}/orders/{order_id}/approve",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("session_id" = String, Path, description = "Session ID"),
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order approved", body = ApiResponse<PendingOrder>),
        (status = 400, description = "Order already decided"),
        (status = 404, description = "Session or order not found")
    ),
    tag = "orders"
)]
pub async fn approve_order(
    State(state): State<AppState>,
    Path((user_id, session_id, order_id)): Path<(String, String, Uuid)>,
) -> Result<Json<ApiResponse<PendingOrder>>> {
    let key = SessionKey::new(user_id, session_id);
    let order = decide(&state, key, order_id, Decision::Approve).await?;
    Ok(Json(ApiResponse::success(order, "Order approved")))
}

/// Manager rejects a pending order.
#[utoipa::path(
    post,
    path = "/api/sessions/{user_id}/{session_id}/orders/{order_id}/reject",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("session_id" = String, Path, description = "Session ID"),
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order rejected", body = ApiResponse<PendingOrder>),
        (status = 400, description = "Order already decided"),
        (status = 404, description = "Session or order not found")
    ),
    tag = "orders"
)]
pub async fn reject_order(
    State(state): State<AppState>,
    Path((user_id, session_id, order_id)): Path<(String, String, Uuid)>,
) -> Result<Json<ApiResponse<PendingOrder>>> {
    let key = SessionKey::new(user_id, session_id);
    let order = decide(&state, key, order_id, Decision::Reject).await?;
    Ok(Json(ApiResponse::success(order, "Order rejected")))
}
