use crate::api::handlers::{chat, health, inventory, sessions};
use utoipa::OpenApi;

/// OpenAPI description of the REST endpoints.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Careflow API",
        description = "Chat-driven supply approvals for hospital operations dashboards"
    ),
    paths(
        health::health,
        chat::chat,
        inventory::list_inventory,
        inventory::low_stock,
        inventory::adjust_inventory,
        sessions::list_sessions,
        sessions::get_session,
        sessions::delete_session,
        sessions::list_orders,
        sessions::approve_order,
        sessions::reject_order,
    ),
    tags(
        (name = "health", description = "Service status"),
        (name = "chat", description = "Inventory assistant"),
        (name = "inventory", description = "Direct stock access"),
        (name = "sessions", description = "Conversation memory"),
        (name = "orders", description = "Manager review of rejected reorders")
    )
)]
pub struct ApiDoc;
