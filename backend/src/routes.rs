//! Routes of the backend service.

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::{
    call_resource, check_health, health_check, publish_stream, query_data, register_datasource,
    remove_datasource, run_stream, subscribe_stream,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/datasources/{uid}",
            put(register_datasource).delete(remove_datasource),
        )
        .route("/api/datasources/{uid}/query", post(query_data))
        .route("/api/datasources/{uid}/resources/{*path}", get(call_resource))
        .route(
            "/api/datasources/{uid}/stream/subscribe/{*path}",
            post(subscribe_stream),
        )
        .route("/api/datasources/{uid}/stream/run/{*path}", get(run_stream))
        .route(
            "/api/datasources/{uid}/stream/publish/{*path}",
            post(publish_stream),
        )
        .route("/api/datasources/{uid}/health", get(check_health))
        .route("/api/health", get(health_check))
}
