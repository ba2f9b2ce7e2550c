//! Backend service for the Materialize TAIL data source.
//!
//! Serves the host's datasource calls over HTTP:
//! - registering datasource instances and their connection settings
//! - snapshot queries and the `relations` resource
//! - live `TAIL` streams as server-sent events
//! - connection health checks

mod convert;
mod handlers;
mod pool_manager;
mod queries;
mod routes;
mod service;
mod state;
mod stream;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "materialize-backend";
const DEFAULT_PORT: u16 = 8090;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Materialize datasource backend API",
        version = "0.1.0",
        description = "Snapshot queries, resources and live TAIL streams for Materialize datasources"
    ),
    paths(
        handlers::register_datasource,
        handlers::remove_datasource,
        handlers::query_data,
        handlers::call_resource,
        handlers::subscribe_stream,
        handlers::run_stream,
        handlers::publish_stream,
        handlers::check_health,
        handlers::health_check,
    ),
    components(schemas(
        common::models::DataSourceInstanceSettings,
        common::models::DataSourceOptions,
        common::models::MaterializeQuery,
        common::models::QueryDataRequest,
        common::models::QueryDataResponse,
        common::models::DataResponse,
        common::models::Frame,
        common::models::Field,
        common::models::FieldType,
        common::models::SubscribeStreamResponse,
        common::models::SubscribeStreamStatus,
        common::models::CheckHealthResponse,
        common::models::HealthStatus,
        handlers::HealthResponse,
    )),
    tags(
        (name = "datasources", description = "Datasource instance endpoints"),
        (name = "streams", description = "Live channel endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else
    load_dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut config = AppConfig::load_with_service(SERVICE_NAME);
    config.port = common::config::env_or("SERVER_PORT", DEFAULT_PORT);

    let state = AppState::new(config.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "Starting service");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!(service = SERVICE_NAME, "Service stopped");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
