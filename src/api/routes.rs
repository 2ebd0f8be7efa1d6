use crate::api::handlers::{chat, events, health, inventory, sessions};
use crate::utils::toml_config::ServerConfig;
use crate::AppState;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Routes mounted under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/chat", post(chat::chat))
        // Inventory
        .route("/inventory", get(inventory::list_inventory))
        .route("/inventory/low-stock", get(inventory::low_stock))
        .route("/inventory/adjust", post(inventory::adjust_inventory))
        // Sessions and manager review
        .route("/sessions", get(sessions::list_sessions))
        .route(
            "/sessions/{user_id}/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/sessions/{user_id}/{session_id}/orders",
            get(sessions::list_orders),
        )
        .route(
            "/sessions/{user_id}/{session_id}/orders/{order_id}/approve",
            post(sessions::approve_order),
        )
        .route(
            "/sessions/{user_id}/{session_id}/orders/{order_id}/reject",
            post(sessions::reject_order),
        )
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// The complete application: API, dashboard WebSocket and middleware.
pub fn build_app(state: AppState) -> Router {
    let server = state.config_manager.config().server.clone();

    let app = Router::new()
        .nest("/api", create_router())
        .route("/ws", get(events::dashboard_ws));

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", crate::api::docs::ApiDoc::openapi()),
        )
    };

    app.layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(cors_layer(&server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::{CareflowConfig, ConfigManager, ProviderConfig};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app(configure: impl FnOnce(&mut CareflowConfig)) -> Router {
        let mut config = CareflowConfig::default();
        config.llm.provider = ProviderConfig::Offline;
        configure(&mut config);
        let state = AppState::from_config(ConfigManager::from_config(config)).unwrap();
        build_app(state)
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let app = app(|c| c.server.max_body_bytes = 64);
        let body = format!(
            r#"{{"message":"{}","session_id":"s1"}}"#,
            "x".repeat(256)
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let app = app(|c| c.server.cors_origins = vec!["http://dashboard.local".to_string()]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(header::ORIGIN, "http://dashboard.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://dashboard.local"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app(|_| {})
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
