//! SQL issued for each tail target.

use common::errors::{AppError, AppResult};
use common::models::query::TailTarget;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Relations offered in the query editor and to dashboard variables.
const RELATIONS_SQL: &str = r#"
    SELECT DISTINCT mzr.name AS name
    FROM mz_catalog.mz_relations mzr
    JOIN mz_catalog.mz_schemas mzs ON mzr.schema_id = mzs.id
    WHERE database_id IS NOT NULL
    ORDER BY mzr.name
"#;

/// The statement returning the current contents of a target.
pub fn snapshot_sql(target: &TailTarget) -> String {
    match target {
        TailTarget::Relation { name } => format!("SELECT * FROM {name}"),
        TailTarget::Select { statement } => statement.to_string(),
    }
}

/// The statement streaming every change to a target from now on.
pub fn tail_sql(target: &TailTarget) -> String {
    match target {
        TailTarget::Relation { name } => format!("TAIL {name} WITH (SNAPSHOT = false)"),
        TailTarget::Select { statement } => format!("TAIL ({statement}) WITH (SNAPSHOT = false)"),
    }
}

pub async fn select_all(pool: &PgPool, target: &TailTarget) -> AppResult<Vec<PgRow>> {
    sqlx::query(&snapshot_sql(target))
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::DatabaseQuery(e.to_string()))
}

pub async fn list_relations(pool: &PgPool) -> AppResult<Vec<String>> {
    let rows = sqlx::query(RELATIONS_SQL)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|e| AppError::DatabaseQuery(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(name: &str) -> TailTarget {
        TailTarget::Relation {
            name: name.parse().unwrap(),
        }
    }

    fn select(statement: &str) -> TailTarget {
        TailTarget::Select {
            statement: statement.parse().unwrap(),
        }
    }

    #[test]
    fn test_snapshot_sql() {
        assert_eq!(snapshot_sql(&relation("my_view")), "SELECT * FROM my_view");
        assert_eq!(snapshot_sql(&select("SELECT a FROM t;")), "SELECT a FROM t");
    }

    #[test]
    fn test_tail_sql_skips_snapshot() {
        assert_eq!(
            tail_sql(&relation("my_view")),
            "TAIL my_view WITH (SNAPSHOT = false)"
        );
        assert_eq!(
            tail_sql(&select("SELECT a FROM t")),
            "TAIL (SELECT a FROM t) WITH (SNAPSHOT = false)"
        );
    }
}
