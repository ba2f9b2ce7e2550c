//! Datasource operations: query data, resources, streams and health.

use std::sync::Arc;

use futures_util::future::join_all;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::frame::Frame;
use common::models::health::CheckHealthResponse;
use common::models::path::{Channel, Path, PathDisplay, TailPath};
use common::models::query::{
    DataResponse, MaterializeQuery, QueryDataRequest, QueryDataResponse, TailTarget,
};
use common::models::settings::DataSourceInstanceSettings;
use common::models::stream::SubscribeStreamResponse;
use sqlx::PgConnection;

use crate::convert::rows_to_frame;
use crate::pool_manager::PoolManager;
use crate::queries;
use crate::state::{AppState, StatementStore};

/// The only resource path served.
pub const RELATIONS_RESOURCE: &str = "relations";

pub struct DatasourceService {
    pool_manager: Arc<PoolManager>,
    statements: Arc<StatementStore>,
}

impl DatasourceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool_manager: state.pool_manager.clone(),
            statements: state.statements.clone(),
        }
    }

    pub async fn register(&self, mut settings: DataSourceInstanceSettings) -> AppResult<()> {
        settings.validate()?;
        if settings.name.is_empty() {
            settings.name = settings.uid.clone();
        }
        self.pool_manager.register(settings).await
    }

    pub async fn remove(&self, uid: &str) -> AppResult<()> {
        self.pool_manager.remove(uid).await?;
        self.statements.remove_datasource(uid).await;
        Ok(())
    }

    /// Runs every query of the request.
    ///
    /// A failing query is reported under its `refId` and does not affect the
    /// others; only an unknown datasource fails the whole call.
    pub async fn query_data(
        &self,
        uid: &str,
        request: QueryDataRequest,
    ) -> AppResult<QueryDataResponse> {
        if !self.pool_manager.contains(uid).await {
            return Err(AppError::DatasourceNotFound(uid.to_string()));
        }
        let responses = join_all(request.queries.iter().map(|query| async move {
            let response = match self.query_single(uid, query).await {
                Ok(frame) => DataResponse::frames(vec![frame]),
                Err(e) => {
                    tracing::warn!(uid = %uid, ref_id = %query.ref_id, error = %e, "Query failed");
                    DataResponse::error(format!(
                        "Error querying backend for {}: {}",
                        query.ref_id, e
                    ))
                }
            };
            (query.ref_id.clone(), response)
        }))
        .await;

        Ok(QueryDataResponse {
            results: responses.into_iter().collect(),
        })
    }

    /// Snapshots one query's target and points the frame at its live channel.
    async fn query_single(&self, uid: &str, query: &MaterializeQuery) -> AppResult<Frame> {
        let target = query.tail_target()?;
        let pool = self.pool_manager.get_pool(uid).await?;
        let rows = queries::select_all(&pool, &target).await?;
        let mut frame = rows_to_frame(&rows)?;

        if let TailTarget::Select { statement } = &target {
            self.statements.insert(uid, statement.clone()).await;
        }

        // Tells the host to switch to streaming on this channel.
        frame.set_channel(Channel::new(uid, target.to_path()).to_string());
        Ok(frame)
    }

    /// Recovers the target of a channel path of datasource `uid`.
    pub async fn resolve(&self, uid: &str, raw_path: &str) -> AppResult<TailTarget> {
        match raw_path.parse::<Path>()? {
            Path::Tail(TailPath::Relation { name }) => Ok(TailTarget::Relation { name }),
            Path::Tail(TailPath::Select { query_id }) => self
                .statements
                .get(uid, &query_id)
                .await
                .map(|statement| TailTarget::Select { statement })
                .ok_or_else(|| AppError::InvalidTailTarget(query_id.into_inner())),
        }
    }

    /// Serves a resource call. Only `relations` exists.
    pub async fn call_resource(&self, uid: &str, path: &str) -> AppResult<Vec<String>> {
        if path.trim_matches('/') != RELATIONS_RESOURCE {
            return Err(AppError::NotFound(format!("/{}", path.trim_start_matches('/'))));
        }
        let pool = self.pool_manager.get_pool(uid).await?;
        queries::list_relations(&pool).await
    }

    /// Answers a new subscriber with the current contents of the target.
    pub async fn subscribe(&self, uid: &str, path: &str) -> AppResult<SubscribeStreamResponse> {
        let target = self.resolve(uid, path).await?;
        let pool = self.pool_manager.get_pool(uid).await?;
        let rows = queries::select_all(&pool, &target).await?;
        Ok(SubscribeStreamResponse::ok(rows_to_frame(&rows)?))
    }

    /// Resolves what a running stream needs: a connection of its own and the
    /// `TAIL` statement. The pool stays free for short queries.
    pub async fn prepare_tail(&self, uid: &str, path: &str) -> AppResult<(PgConnection, String)> {
        let target = self.resolve(uid, path).await?;
        let connection = self.pool_manager.connect_dedicated(uid).await?;
        Ok((connection, queries::tail_sql(&target)))
    }

    /// Connects and runs `SELECT 1`; failures are reported in the result.
    pub async fn check_health(&self, uid: &str) -> AppResult<CheckHealthResponse> {
        if !self.pool_manager.contains(uid).await {
            return Err(AppError::DatasourceNotFound(uid.to_string()));
        }
        Ok(match self.pool_manager.ping(uid).await {
            Ok(latency) => {
                tracing::debug!(uid = %uid, latency_ms = latency.as_millis() as u64, "Health check passed");
                CheckHealthResponse::ok()
            }
            Err(e) => CheckHealthResponse::error(e.to_string()),
        })
    }
}
