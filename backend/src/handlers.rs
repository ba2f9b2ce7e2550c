//! HTTP handlers for datasource instances.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::models::health::CheckHealthResponse;
use common::models::query::{QueryDataRequest, QueryDataResponse};
use common::models::settings::DataSourceInstanceSettings;
use common::models::stream::SubscribeStreamResponse;
use common::response::ApiResponse;

use crate::service::DatasourceService;
use crate::state::AppState;
use crate::stream::{sse_response, tail_events};
use crate::SERVICE_NAME;

/// Register or replace a datasource instance
#[utoipa::path(
    put,
    path = "/api/datasources/{uid}",
    tag = "datasources",
    request_body = DataSourceInstanceSettings,
    params(
        ("uid" = String, Path, description = "Datasource uid")
    ),
    responses(
        (status = 200, description = "Instance registered", body = ApiResponse<bool>),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn register_datasource(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(mut settings): Json<DataSourceInstanceSettings>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    settings.uid = uid;
    DatasourceService::new(&state).register(settings).await?;
    Ok(Json(ApiResponse::ok_with_service(true, SERVICE_NAME)))
}

/// Forget a datasource instance and close its pool
#[utoipa::path(
    delete,
    path = "/api/datasources/{uid}",
    tag = "datasources",
    params(
        ("uid" = String, Path, description = "Datasource uid")
    ),
    responses(
        (status = 200, description = "Instance removed", body = ApiResponse<bool>),
        (status = 404, description = "Datasource not found")
    )
)]
pub async fn remove_datasource(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    DatasourceService::new(&state).remove(&uid).await?;
    Ok(Json(ApiResponse::ok_with_service(true, SERVICE_NAME)))
}

/// Snapshot every query of a panel refresh
#[utoipa::path(
    post,
    path = "/api/datasources/{uid}/query",
    tag = "datasources",
    request_body = QueryDataRequest,
    params(
        ("uid" = String, Path, description = "Datasource uid")
    ),
    responses(
        (status = 200, description = "Results keyed by refId", body = ApiResponse<QueryDataResponse>),
        (status = 404, description = "Datasource not found")
    )
)]
pub async fn query_data(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(request): Json<QueryDataRequest>,
) -> Result<Json<ApiResponse<QueryDataResponse>>, AppError> {
    let data = DatasourceService::new(&state).query_data(&uid, request).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// Fetch a resource; only `relations` is served
#[utoipa::path(
    get,
    path = "/api/datasources/{uid}/resources/{path}",
    tag = "datasources",
    params(
        ("uid" = String, Path, description = "Datasource uid"),
        ("path" = String, Path, description = "Resource path")
    ),
    responses(
        (status = 200, description = "Relation names", body = ApiResponse<Vec<String>>),
        (status = 404, description = "Unknown resource")
    )
)]
pub async fn call_resource(
    State(state): State<AppState>,
    Path((uid, path)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let data = DatasourceService::new(&state).call_resource(&uid, &path).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// Subscribe to a channel and receive its current contents
#[utoipa::path(
    post,
    path = "/api/datasources/{uid}/stream/subscribe/{path}",
    tag = "streams",
    params(
        ("uid" = String, Path, description = "Datasource uid"),
        ("path" = String, Path, description = "Channel path, e.g. tail/relation/<name>")
    ),
    responses(
        (status = 200, description = "Initial data", body = ApiResponse<SubscribeStreamResponse>),
        (status = 400, description = "Unknown path")
    )
)]
pub async fn subscribe_stream(
    State(state): State<AppState>,
    Path((uid, path)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SubscribeStreamResponse>>, AppError> {
    let data = DatasourceService::new(&state).subscribe(&uid, &path).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// Run a `TAIL` and stream each row as a frame over server-sent events
#[utoipa::path(
    get,
    path = "/api/datasources/{uid}/stream/run/{path}",
    tag = "streams",
    params(
        ("uid" = String, Path, description = "Datasource uid"),
        ("path" = String, Path, description = "Channel path")
    ),
    responses(
        (status = 200, description = "Event stream of `frame` and `error` events"),
        (status = 400, description = "Unknown path")
    )
)]
pub async fn run_stream(
    State(state): State<AppState>,
    Path((uid, path)): Path<(String, String)>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (connection, sql) = DatasourceService::new(&state).prepare_tail(&uid, &path).await?;
    tracing::info!(uid = %uid, path = %path, "Running stream");
    Ok(sse_response(tail_events(connection, sql)))
}

/// Publishing to a channel is not supported
#[utoipa::path(
    post,
    path = "/api/datasources/{uid}/stream/publish/{path}",
    tag = "streams",
    params(
        ("uid" = String, Path, description = "Datasource uid"),
        ("path" = String, Path, description = "Channel path")
    ),
    responses(
        (status = 501, description = "Not supported")
    )
)]
pub async fn publish_stream(
    Path((_uid, path)): Path<(String, String)>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    tracing::debug!(path = %path, "Publishing to stream is not implemented");
    Err(AppError::Unsupported("publishing to a stream".into()))
}

/// Check that the datasource can reach its server
#[utoipa::path(
    get,
    path = "/api/datasources/{uid}/health",
    tag = "datasources",
    params(
        ("uid" = String, Path, description = "Datasource uid")
    ),
    responses(
        (status = 200, description = "Health check result", body = ApiResponse<CheckHealthResponse>),
        (status = 404, description = "Datasource not found")
    )
)]
pub async fn check_health(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<CheckHealthResponse>>, AppError> {
    let data = DatasourceService::new(&state).check_health(&uid).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// Service liveness
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        datasources: state.pool_manager.instance_count().await,
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Registered datasource instances
    pub datasources: usize,
}
