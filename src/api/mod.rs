//! HTTP API Handlers and Routes
//!
//! This module provides the REST and WebSocket layer for Careflow, built on
//! the Axum web framework.
//!
//! # API Endpoints
//!
//! ## Chat (`/api/chat`)
//! - `POST /api/chat` - Send a message to the inventory assistant
//!
//! ## Inventory (`/api/inventory`)
//! - `GET /api/inventory?location=&item=` - List stock records
//! - `GET /api/inventory/low-stock` - Records below their minimum
//! - `POST /api/inventory/adjust` - Direct stock change
//!
//! ## Sessions (`/api/sessions`)
//! - `GET /api/sessions` - List sessions
//! - `GET /api/sessions/{user_id}/{session_id}` - Session memory
//! - `DELETE /api/sessions/{user_id}/{session_id}` - Forget a session
//! - `GET /api/sessions/{user_id}/{session_id}/orders` - Pending orders
//! - `POST .../orders/{order_id}/approve` - Manager approval
//! - `POST .../orders/{order_id}/reject` - Manager rejection
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! ## Dashboard events (`/ws`)
//! - `GET /ws` - WebSocket stream of `dashboard_update` / `new_alert` events
//!
//! # OpenAPI Documentation
//!
//! When the `swagger-ui` feature is enabled, interactive API documentation
//! is available at `/swagger-ui/`.

/// OpenAPI document.
pub mod docs;
/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
