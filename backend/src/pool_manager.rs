//! Connection pools to the streaming SQL engine.
//!
//! The host registers each datasource instance with its settings; a pool is
//! opened the first time the instance is used and cached until the settings
//! change or the instance is removed. Long-running `TAIL`s get a connection of
//! their own so they never hold pooled connections.

use std::collections::HashMap;
use std::time::Duration;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::settings::{ConnectionParams, DataSourceInstanceSettings};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool};
use tokio::sync::RwLock;

struct Instance {
    settings: DataSourceInstanceSettings,
    pool: Option<PgPool>,
}

/// Keeps one pool per datasource uid.
pub struct PoolManager {
    config: AppConfig,
    instances: RwLock<HashMap<String, Instance>>,
}

impl PoolManager {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Registers or replaces a datasource instance.
    ///
    /// Settings are checked up front, but no connection is made until the
    /// instance is first used. A replaced instance's pool is closed.
    pub async fn register(&self, settings: DataSourceInstanceSettings) -> AppResult<()> {
        ConnectionParams::from_instance(&settings)?;
        let uid = settings.uid.clone();
        let previous = self.instances.write().await.insert(
            uid.clone(),
            Instance {
                settings,
                pool: None,
            },
        );
        if let Some(pool) = previous.and_then(|i| i.pool) {
            pool.close().await;
            tracing::info!(uid = %uid, "Datasource settings replaced, pool closed");
        } else {
            tracing::info!(uid = %uid, "Datasource registered");
        }
        Ok(())
    }

    /// Forgets a datasource instance and closes its pool.
    pub async fn remove(&self, uid: &str) -> AppResult<()> {
        let instance = self
            .instances
            .write()
            .await
            .remove(uid)
            .ok_or_else(|| AppError::DatasourceNotFound(uid.to_string()))?;
        if let Some(pool) = instance.pool {
            pool.close().await;
        }
        tracing::info!(uid = %uid, "Datasource removed");
        Ok(())
    }

    pub async fn contains(&self, uid: &str) -> bool {
        self.instances.read().await.contains_key(uid)
    }

    pub async fn settings(&self, uid: &str) -> AppResult<DataSourceInstanceSettings> {
        self.instances
            .read()
            .await
            .get(uid)
            .map(|i| i.settings.clone())
            .ok_or_else(|| AppError::DatasourceNotFound(uid.to_string()))
    }

    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Returns the pool for `uid`, connecting on first use.
    pub async fn get_pool(&self, uid: &str) -> AppResult<PgPool> {
        let settings = {
            let instances = self.instances.read().await;
            let instance = instances
                .get(uid)
                .ok_or_else(|| AppError::DatasourceNotFound(uid.to_string()))?;
            if let Some(pool) = &instance.pool {
                return Ok(pool.clone());
            }
            instance.settings.clone()
        };

        let pool = self.try_create_pool(&settings).await?;

        let mut instances = self.instances.write().await;
        match instances.get_mut(uid) {
            // Another request may have connected while we were; keep theirs.
            Some(Instance {
                pool: Some(existing),
                ..
            }) => Ok(existing.clone()),
            Some(instance) if instance.settings == settings => {
                instance.pool = Some(pool.clone());
                tracing::info!(uid = %uid, "Pool created");
                Ok(pool)
            }
            // Settings changed or instance removed while connecting; use
            // the pool for this request only.
            _ => Ok(pool),
        }
    }

    async fn try_create_pool(&self, settings: &DataSourceInstanceSettings) -> AppResult<PgPool> {
        let params = ConnectionParams::from_instance(settings)?;
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);

        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(timeout)
            .connect_with(self.connect_options(&params))
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))
    }

    /// Opens a connection outside the pool, owned by the caller.
    pub async fn connect_dedicated(&self, uid: &str) -> AppResult<PgConnection> {
        let settings = self.settings(uid).await?;
        let params = ConnectionParams::from_instance(&settings)?;
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);

        let connection = tokio::time::timeout(
            timeout,
            PgConnection::connect_with(&self.connect_options(&params)),
        )
        .await
        .map_err(|_| {
            AppError::DatabaseConnection(format!("timed out after {}s", timeout.as_secs()))
        })?
        .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        tracing::debug!(uid = %uid, "Dedicated connection opened");
        Ok(connection)
    }

    #[cfg(test)]
    pub async fn has_pool(&self, uid: &str) -> bool {
        self.instances
            .read()
            .await
            .get(uid)
            .is_some_and(|i| i.pool.is_some())
    }

    fn connect_options(&self, params: &ConnectionParams) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .database(&self.config.database)
            .application_name(&self.config.service_name);
        match &params.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    /// Runs `SELECT 1` against the instance.
    pub async fn ping(&self, uid: &str) -> AppResult<Duration> {
        let pool = self.get_pool(uid).await?;
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::settings::DataSourceOptions;

    fn manager() -> PoolManager {
        PoolManager::new(AppConfig::load_with_service("test"))
    }

    fn unreachable(uid: &str) -> DataSourceInstanceSettings {
        let mut settings = settings(uid, Some("127.0.0.1"));
        settings.json_data.port = Some(1);
        settings
    }

    fn settings(uid: &str, host: Option<&str>) -> DataSourceInstanceSettings {
        DataSourceInstanceSettings {
            uid: uid.into(),
            name: uid.into(),
            json_data: DataSourceOptions {
                host: host.map(String::from),
                port: Some(6875),
                username: None,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let manager = manager();
        manager.register(settings("a", Some("localhost"))).await.unwrap();
        assert!(manager.contains("a").await);
        assert_eq!(manager.instance_count().await, 1);
        manager.remove("a").await.unwrap();
        assert!(!manager.contains("a").await);
    }

    #[tokio::test]
    async fn test_register_rejects_missing_host() {
        let manager = manager();
        assert!(matches!(
            manager.register(settings("a", None)).await,
            Err(AppError::InvalidDatasourceSettings(_))
        ));
        assert_eq!(manager.instance_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_uid() {
        let manager = manager();
        assert_eq!(
            manager.get_pool("missing").await.unwrap_err(),
            AppError::DatasourceNotFound("missing".into())
        );
        assert!(manager.remove("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_dedicated_connection_leaves_pool_alone() {
        let manager = manager();
        manager.register(unreachable("a")).await.unwrap();
        assert!(matches!(
            manager.connect_dedicated("a").await,
            Err(AppError::DatabaseConnection(_))
        ));
        assert!(!manager.has_pool("a").await);
        assert_eq!(
            manager.connect_dedicated("missing").await.unwrap_err(),
            AppError::DatasourceNotFound("missing".into())
        );
    }
}
