//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Chat endpoint.
pub mod chat;
/// Dashboard WebSocket.
pub mod events;
/// Health check.
pub mod health;
/// Direct stock endpoints.
pub mod inventory;
/// Session inspection and order review.
pub mod sessions;
