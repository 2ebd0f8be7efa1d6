//! Direct stock endpoints used by the dashboard views.

use crate::{
    events::DashboardEvent,
    inventory::{Adjustment, InventoryFilter, InventoryRecord, StockChange},
    types::{ApiResponse, AppError, Result},
    AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

/// Request to change one stock level by a signed amount.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustRequest {
    pub location: String,
    pub item: String,
    /// Positive adds stock, negative removes it
    pub delta: i64,
}

/// List stock records, optionally filtered.
#[utoipa::path(
    get,
    path = "/api/inventory",
    params(
        ("location" = Option<String>, Query, description = "Only this location"),
        ("item" = Option<String>, Query, description = "Only this item")
    ),
    responses(
        (status = 200, description = "Stock records", body = ApiResponse<Vec<InventoryRecord>>)
    ),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(filter): Query<InventoryFilter>,
) -> Result<Json<ApiResponse<Vec<InventoryRecord>>>> {
    let records = state.inventory.list(&filter).await?;
    let message = format!("{} record(s)", records.len());
    Ok(Json(ApiResponse::success(records, message)))
}

/// Records currently below their minimum threshold.
#[utoipa::path(
    get,
    path = "/api/inventory/low-stock",
    responses(
        (status = 200, description = "Low stock records", body = ApiResponse<Vec<InventoryRecord>>)
    ),
    tag = "inventory"
)]
pub async fn low_stock(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<InventoryRecord>>>> {
    let records: Vec<InventoryRecord> = state
        .inventory
        .list(&InventoryFilter::default())
        .await?
        .into_iter()
        .filter(InventoryRecord::is_low)
        .collect();
    let message = format!("{} record(s) below minimum", records.len());
    Ok(Json(ApiResponse::success(records, message)))
}

/// Adjust stock outside the chat flow.
///
/// No suggestions are generated here; bundles belong to chat sessions.
#[utoipa::path(
    post,
    path = "/api/inventory/adjust",
    request_body = AdjustRequest,
    responses(
        (status = 200, description = "Stock changed", body = ApiResponse<StockChange>),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "No such record"),
        (status = 409, description = "Would make stock negative")
    ),
    tag = "inventory"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    Json(payload): Json<AdjustRequest>,
) -> Result<Json<ApiResponse<StockChange>>> {
    if payload.delta == 0 {
        return Err(AppError::InvalidInput("delta must not be zero".to_string()));
    }

    let change = state
        .inventory
        .adjust(
            &payload.location,
            &payload.item,
            Adjustment::Delta(payload.delta),
        )
        .await?;

    state
        .events
        .publish(DashboardEvent::stock_changed(&change.record, change.before));
    info!(
        "Direct adjustment of {} at {}: {} -> {}",
        change.record.item, change.record.location, change.before, change.after
    );

    let message = if change.is_low() {
        format!(
            "Stock updated; {} at {} is below its minimum of {}",
            change.record.item, change.record.location, change.record.min_threshold
        )
    } else {
        "Stock updated".to_string()
    };
    Ok(Json(ApiResponse::success(change, message)))
}
