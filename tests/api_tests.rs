//! End-to-end tests of the HTTP API against an in-memory state.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use careflow::{
    api::routes::build_app,
    memory::{SessionKey, SessionStore},
    AppState,
};
use common::{test_state, test_state_with_llm, MockLLMClient};
use serde_json::{json, Value};
use std::time::Duration;

fn server(state: AppState) -> TestServer {
    TestServer::new(build_app(state)).expect("Failed to create test server")
}

async fn chat(server: &TestServer, session: &str, message: &str) -> Value {
    let response = server
        .post("/api/chat")
        .json(&json!({
            "message": message,
            "session_id": session,
            "user_id": "nurse-1"
        }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

async fn stock(server: &TestServer, location: &str, item: &str) -> u64 {
    let body: Value = server
        .get("/api/inventory")
        .add_query_param("location", location)
        .add_query_param("item", item)
        .await
        .json();
    body["data"][0]["quantity"].as_u64().expect("record exists")
}

// ============= Health =============

#[tokio::test]
async fn test_health() {
    let server = server(test_state());
    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["data"]["sessions"], 0);
}

// ============= Chat workflow =============

#[tokio::test]
async fn test_reduce_below_threshold_creates_bundle() {
    let server = server(test_state());

    let body = chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;
    assert_eq!(body["intent"], "modify");
    assert_eq!(stock(&server, "ICU-01", "N95 Masks").await, 66);

    let bundle = &body["pending_approvals"];
    assert_eq!(bundle["transfers"][0]["from_location"], "ER-01");
    assert_eq!(bundle["transfers"][0]["quantity"], 15);
    assert_eq!(bundle["transfers"][1]["from_location"], "WARD-02");
    assert_eq!(bundle["reorder"]["quantity"], 80);
}

#[tokio::test]
async fn test_reduce_above_threshold_has_no_bundle() {
    let server = server(test_state());

    let body = chat(&server, "s1", "use 10 Saline Bags at ICU-01").await;
    assert_eq!(body["intent"], "modify");
    assert!(body.get("pending_approvals").is_none());
    assert_eq!(stock(&server, "ICU-01", "Saline Bags").await, 40);
}

#[tokio::test]
async fn test_approve_transfer_moves_stock() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let body = chat(&server, "s1", "approve transfer 1").await;
    assert_eq!(body["intent"], "approve");
    assert!(body.get("pending_approvals").is_none());

    assert_eq!(stock(&server, "ER-01", "N95 Masks").await, 15);
    assert_eq!(stock(&server, "ICU-01", "N95 Masks").await, 81);
}

#[tokio::test]
async fn test_reject_files_pending_order() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let body = chat(&server, "s1", "no").await;
    assert_eq!(body["intent"], "reject");
    assert!(body.get("pending_approvals").is_none());

    let orders = body["pending_orders"].as_array().expect("orders listed");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["quantity"], 80);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["manager_approved"], false);

    // Nothing moved
    assert_eq!(stock(&server, "ICU-01", "N95 Masks").await, 66);
}

#[tokio::test]
async fn test_ambiguous_yes_asks_for_clarification() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let body = chat(&server, "s1", "yes").await;
    assert_eq!(body["intent"], "approve");
    assert!(body.get("pending_approvals").is_some());
    assert_eq!(stock(&server, "ICU-01", "N95 Masks").await, 66);
    assert_eq!(stock(&server, "ER-01", "N95 Masks").await, 30);
}

#[tokio::test]
async fn test_approve_reorder_places_purchase_order() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let body = chat(&server, "s1", "approve the reorder").await;
    assert_eq!(body["purchase_order"]["quantity"], 80);
    assert_eq!(body["purchase_order"]["location"], "ICU-01");
    assert!(body.get("pending_approvals").is_none());
}

#[tokio::test]
async fn test_explicit_approve_with_nothing_pending() {
    let server = server(test_state());

    let body = chat(&server, "s1", "approve").await;
    assert_eq!(body["intent"], "approve");
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("nothing pending"));
}

#[tokio::test]
async fn test_bare_yes_without_bundle_goes_to_model() {
    let mock = MockLLMClient::new("Happy to help.");
    let server = server(test_state_with_llm(mock.clone()));

    let body = chat(&server, "s1", "yes").await;
    assert_eq!(body["intent"], "unknown");
    assert_eq!(body["response"], "Happy to help.");
    assert_eq!(body["degraded"], false);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_free_text_degrades_when_model_fails() {
    let server = server(test_state_with_llm(MockLLMClient::failing()));

    let body = chat(&server, "s1", "tell me a joke").await;
    assert_eq!(body["intent"], "unknown");
    assert_eq!(body["degraded"], true);
}

#[tokio::test]
async fn test_sessions_do_not_share_bundles() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let body = chat(&server, "s2", "approve transfer 1").await;
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("nothing pending"));
    assert_eq!(stock(&server, "ER-01", "N95 Masks").await, 30);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let server = server(test_state());
    let response = server
        .post("/api/chat")
        .json(&json!({ "message": "   ", "session_id": "s1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_location_changes_nothing() {
    let server = server(test_state());
    let response = server
        .post("/api/chat")
        .json(&json!({
            "message": "reduce 5 N95 Masks at ER-02",
            "session_id": "s1",
            "user_id": "nurse-1",
            "context": { "location": "WARD-02", "item": "N95 Masks" }
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["intent"], "modify");
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("I don't know location ER-02"));
    assert_eq!(stock(&server, "WARD-02", "N95 Masks").await, 40);
}

#[tokio::test]
async fn test_usage_question_is_a_query() {
    let server = server(test_state());
    let body = chat(
        &server,
        "s1",
        "how many N95 Masks did ICU-01 use in the last 3 days?",
    )
    .await;
    assert_eq!(body["intent"], "query");
    assert_eq!(stock(&server, "ICU-01", "N95 Masks").await, 71);
}

#[tokio::test]
async fn test_restock_clears_pending_suggestions() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let body = chat(&server, "s1", "add 100 N95 Masks at ICU-01").await;
    assert!(body.get("pending_approvals").is_none());
    assert_eq!(stock(&server, "ICU-01", "N95 Masks").await, 166);

    let body = chat(&server, "s1", "yes").await;
    assert_eq!(body["intent"], "unknown");
    assert_eq!(stock(&server, "ER-01", "N95 Masks").await, 30);
}

// ============= Dashboard WebSocket =============

#[tokio::test]
async fn test_dashboard_socket_receives_chat_events() {
    let server = TestServer::builder()
        .http_transport()
        .build(build_app(test_state()))
        .expect("Failed to create test server");

    let mut socket = server.get_websocket("/ws").await.into_websocket().await;

    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let update: Value = socket.receive_json().await;
    assert_eq!(update["type"], "dashboard_update");
    assert_eq!(update["data"]["kind"], "stock_changed");
    assert_eq!(update["data"]["location"], "ICU-01");
    assert_eq!(update["data"]["quantity"], 66);

    let alert: Value = socket.receive_json().await;
    assert_eq!(alert["type"], "new_alert");
    assert_eq!(alert["data"]["kind"], "low_stock");
    assert_eq!(alert["data"]["context"]["item"], "N95 Masks");

    socket.close().await;
}

// ============= Inventory =============

#[tokio::test]
async fn test_low_stock_listing() {
    let server = server(test_state());
    let body: Value = server.get("/api/inventory/low-stock").await.json();
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["location"], "ICU-01");
    assert_eq!(records[0]["item"], "N95 Masks");
}

#[tokio::test]
async fn test_adjust_inventory() {
    let state = test_state();
    let mut events = state.events.subscribe();
    let server = server(state);

    let response = server
        .post("/api/inventory/adjust")
        .json(&json!({ "location": "ER-01", "item": "Saline Bags", "delta": 8 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["after"], 20);

    let event = events.try_recv().expect("stock change broadcast");
    assert_eq!(event.event_type(), "dashboard_update");
}

#[tokio::test]
async fn test_adjust_inventory_errors() {
    let server = server(test_state());

    let negative = server
        .post("/api/inventory/adjust")
        .json(&json!({ "location": "ER-01", "item": "Saline Bags", "delta": -13 }))
        .await;
    assert_eq!(negative.status_code(), StatusCode::CONFLICT);
    assert_eq!(stock(&server, "ER-01", "Saline Bags").await, 12);

    let missing = server
        .post("/api/inventory/adjust")
        .json(&json!({ "location": "OR-09", "item": "Saline Bags", "delta": 1 }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let overflow = server
        .post("/api/inventory/adjust")
        .json(&json!({ "location": "ER-01", "item": "Saline Bags", "delta": 5_000_000_000_i64 }))
        .await;
    assert_eq!(overflow.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(stock(&server, "ER-01", "Saline Bags").await, 12);

    let zero = server
        .post("/api/inventory/adjust")
        .json(&json!({ "location": "ER-01", "item": "Saline Bags", "delta": 0 }))
        .await;
    assert_eq!(zero.status_code(), StatusCode::BAD_REQUEST);
}

// ============= Sessions and orders =============

#[tokio::test]
async fn test_manager_approves_pending_order() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;
    let body = chat(&server, "s1", "no because over budget").await;
    let order_id = body["pending_orders"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["pending_orders"][0]["reason"], "over budget");

    let approved = server
        .post(&format!("/api/sessions/nurse-1/s1/orders/{}/approve", order_id))
        .await;
    approved.assert_status_ok();
    let approved: Value = approved.json();
    assert_eq!(approved["data"]["status"], "approved");
    assert_eq!(approved["data"]["manager_approved"], true);

    // Decisions are final
    let again = server
        .post(&format!("/api/sessions/nurse-1/s1/orders/{}/reject", order_id))
        .await;
    assert_eq!(again.status_code(), StatusCode::BAD_REQUEST);

    let orders: Value = server.get("/api/sessions/nurse-1/s1/orders").await.json();
    assert_eq!(orders["data"][0]["status"], "approved");
}

#[tokio::test]
async fn test_unknown_order_and_session() {
    let server = server(test_state());
    chat(&server, "s1", "hello there").await;

    let unknown_order = server
        .post(&format!(
            "/api/sessions/nurse-1/s1/orders/{}/approve",
            uuid::Uuid::new_v4()
        ))
        .await;
    assert_eq!(unknown_order.status_code(), StatusCode::NOT_FOUND);

    let unknown_session = server.get("/api/sessions/nurse-1/nope").await;
    assert_eq!(unknown_session.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_listing_and_delete() {
    let server = server(test_state());
    chat(&server, "s1", "reduce 5 units of N95 Masks at ICU-01").await;

    let sessions: Value = server.get("/api/sessions").await.json();
    assert_eq!(sessions["data"][0]["session_id"], "s1");
    assert_eq!(sessions["data"][0]["approval_state"], "awaiting_approval");

    server
        .delete("/api/sessions/nurse-1/s1")
        .await
        .assert_status_ok();
    let gone = server.get("/api/sessions/nurse-1/s1").await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_listing_skips_busy_session() {
    let state = test_state();
    let sessions = state.sessions.clone();
    let server = server(state);
    chat(&server, "s1", "hello").await;
    chat(&server, "s2", "hello").await;

    // A turn in progress on s2
    let _held = sessions.checkout(&SessionKey::new("nurse-1", "s2")).await;

    let response = tokio::time::timeout(Duration::from_secs(2), async {
        server.get("/api/sessions").await
    })
    .await
    .expect("listing waited on a busy session");
    response.assert_status_ok();

    let body: Value = response.json();
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["session_id"], "s1");
    assert!(body["message"].as_str().unwrap().contains("1 busy"));
}
