//! Application state for the backend service.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use common::config::AppConfig;
use common::models::path::QueryId;
use common::models::query::SelectStatement;
use tokio::sync::RwLock;

use crate::pool_manager::PoolManager;

/// Statements kept per datasource before the oldest is forgotten.
pub const MAX_STATEMENTS_PER_DATASOURCE: usize = 256;

#[derive(Default)]
struct Statements {
    by_id: HashMap<QueryId, SelectStatement>,
    // Insertion order, oldest first.
    order: VecDeque<QueryId>,
}

/// Select statements seen by query-data calls, keyed by their path-safe ID.
///
/// A stream subscription only carries the channel path, so this is how it
/// recovers the statement the panel asked for.
pub struct StatementStore {
    capacity: usize,
    datasources: RwLock<HashMap<String, Statements>>,
}

impl StatementStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            datasources: RwLock::new(HashMap::new()),
        }
    }

    /// Remembers `statement` for `uid`, evicting the oldest one over capacity.
    pub async fn insert(&self, uid: &str, statement: SelectStatement) -> QueryId {
        let id = QueryId::from_statement(&statement);
        let mut datasources = self.datasources.write().await;
        let statements = datasources.entry(uid.to_string()).or_default();
        if statements.by_id.insert(id.clone(), statement).is_none() {
            statements.order.push_back(id.clone());
            while statements.order.len() > self.capacity {
                if let Some(oldest) = statements.order.pop_front() {
                    statements.by_id.remove(&oldest);
                }
            }
        }
        id
    }

    pub async fn get(&self, uid: &str, id: &QueryId) -> Option<SelectStatement> {
        self.datasources
            .read()
            .await
            .get(uid)
            .and_then(|s| s.by_id.get(id))
            .cloned()
    }

    /// Forgets every statement of a removed datasource.
    pub async fn remove_datasource(&self, uid: &str) {
        self.datasources.write().await.remove(uid);
    }

    #[cfg(test)]
    pub async fn len(&self, uid: &str) -> usize {
        self.datasources
            .read()
            .await
            .get(uid)
            .map_or(0, |s| s.by_id.len())
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool_manager: Arc<PoolManager>,
    pub statements: Arc<StatementStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            pool_manager: Arc::new(PoolManager::new(config)),
            statements: Arc::new(StatementStore::new(MAX_STATEMENTS_PER_DATASOURCE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(n: usize) -> SelectStatement {
        format!("SELECT {n}").parse().unwrap()
    }

    #[tokio::test]
    async fn test_oldest_statement_is_evicted() {
        let store = StatementStore::new(2);
        let first = store.insert("mz", statement(1)).await;
        let second = store.insert("mz", statement(2)).await;
        let third = store.insert("mz", statement(3)).await;

        assert_eq!(store.len("mz").await, 2);
        assert_eq!(store.get("mz", &first).await, None);
        assert_eq!(store.get("mz", &second).await, Some(statement(2)));
        assert_eq!(store.get("mz", &third).await, Some(statement(3)));
    }

    #[tokio::test]
    async fn test_repeated_statement_takes_one_slot() {
        let store = StatementStore::new(2);
        store.insert("mz", statement(1)).await;
        store.insert("mz", statement(1)).await;
        assert_eq!(store.len("mz").await, 1);
    }

    #[tokio::test]
    async fn test_statements_are_scoped_to_datasource() {
        let store = StatementStore::new(2);
        let id = store.insert("a", statement(1)).await;
        assert_eq!(store.get("b", &id).await, None);

        store.remove_datasource("a").await;
        assert_eq!(store.get("a", &id).await, None);
        assert_eq!(store.len("a").await, 0);
    }
}
