//! The query model sent from a dashboard panel to the backend.
//!
//! A query always asks for the `TAIL` operation, against either an existing
//! relation or the output of a `SELECT` statement. The wire form is flat JSON
//! (`{"refId", "operation", "target", "name" | "statement"}`); the payload field
//! that belongs to the other target is never read.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};
use crate::models::frame::Frame;

/// Operations the backend can perform.
///
/// Currently the backend only supports running the `TAIL` statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Tail a relation or the output of a select statement.
    #[default]
    Tail,
}

/// Which kind of target a query tails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// An existing relation (source, table or view).
    #[default]
    Relation,
    /// A SELECT statement.
    Select,
}

/// The payload of a query, tagged by `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "target", rename_all = "lowercase")]
pub enum QueryTarget {
    Relation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Select {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        statement: Option<String>,
    },
}

impl QueryTarget {
    pub fn kind(&self) -> Target {
        match self {
            Self::Relation { .. } => Target::Relation,
            Self::Select { .. } => Target::Select,
        }
    }
}

/// A query sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeQuery {
    /// Identifier the host uses to match results to panel queries.
    pub ref_id: String,
    #[serde(default)]
    pub operation: Operation,
    #[serde(flatten)]
    pub target: QueryTarget,
}

impl MaterializeQuery {
    /// A query tailing the named relation.
    pub fn relation(ref_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            operation: Operation::Tail,
            target: QueryTarget::Relation { name },
        }
    }

    /// A query tailing the output of a select statement.
    pub fn select(ref_id: impl Into<String>, statement: Option<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            operation: Operation::Tail,
            target: QueryTarget::Select { statement },
        }
    }

    /// The query a freshly added panel starts with.
    pub fn new_default(ref_id: impl Into<String>) -> Self {
        Self::relation(ref_id, None)
    }

    pub fn kind(&self) -> Target {
        self.target.kind()
    }

    /// The relation name, when this query tails a relation.
    pub fn name(&self) -> Option<&str> {
        match &self.target {
            QueryTarget::Relation { name } => name.as_deref(),
            QueryTarget::Select { .. } => None,
        }
    }

    /// The statement text, when this query tails a select statement.
    pub fn statement(&self) -> Option<&str> {
        match &self.target {
            QueryTarget::Select { statement } => statement.as_deref(),
            QueryTarget::Relation { .. } => None,
        }
    }

    /// Validates the payload into a [`TailTarget`] the backend can execute.
    pub fn tail_target(&self) -> AppResult<TailTarget> {
        match &self.target {
            QueryTarget::Relation { name: Some(name) } => Ok(TailTarget::Relation {
                name: name.parse()?,
            }),
            QueryTarget::Select {
                statement: Some(statement),
            } => Ok(TailTarget::Select {
                statement: statement.parse()?,
            }),
            _ => Err(AppError::MissingTailTarget),
        }
    }
}

/// Name of a relation in the SQL engine.
///
/// Only ASCII alphanumerics, `.` and `_` are accepted, so the name can be
/// spliced into SQL text and channel paths as-is.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RelationName(String);

impl RelationName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RelationName {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let valid = !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(AppError::InvalidTailTarget(format!("Invalid relation name {s}")))
        }
    }
}

/// A `SELECT` statement whose output should be tailed.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SelectStatement(String);

impl SelectStatement {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SelectStatement {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let trimmed = s.trim().trim_end_matches(';').trim_end();
        if trimmed.is_empty() {
            return Err(AppError::MissingTailTarget);
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A validated target the backend can snapshot and tail.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum TailTarget {
    /// Tail an existing relation (source, table or view).
    Relation { name: RelationName },
    /// Tail the output of a SELECT statement.
    Select { statement: SelectStatement },
}

/// Body of a query-data call: every query of one panel refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryDataRequest {
    pub queries: Vec<MaterializeQuery>,
}

/// Result for a single query, keyed by `refId` in [`QueryDataResponse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DataResponse {
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataResponse {
    pub fn frames(frames: Vec<Frame>) -> Self {
        Self { frames, error: None }
    }

    pub fn error(error: impl fmt::Display) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryDataResponse {
    pub results: BTreeMap<String, DataResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_relation() {
        let query: MaterializeQuery = serde_json::from_str(
            r#"{"refId": "A", "operation": "tail", "target": "relation", "name": "some_table"}"#,
        )
        .unwrap();
        assert_eq!(query, MaterializeQuery::relation("A", Some("some_table".into())));
        assert_eq!(
            query.tail_target().unwrap(),
            TailTarget::Relation {
                name: "some_table".parse().unwrap()
            }
        );
    }

    #[test]
    fn test_deserialize_statement_ignores_name() {
        let query: MaterializeQuery = serde_json::from_str(
            r#"{"refId": "B", "target": "select", "name": "ignored", "statement": "SELECT * FROM my_table"}"#,
        )
        .unwrap();
        assert_eq!(query.operation, Operation::Tail);
        assert_eq!(query.name(), None);
        assert_eq!(query.statement(), Some("SELECT * FROM my_table"));
    }

    #[test]
    fn test_serialize_is_flat() {
        let value = serde_json::to_value(MaterializeQuery::relation("A", Some("t".into()))).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"refId": "A", "operation": "tail", "target": "relation", "name": "t"})
        );
    }

    #[test]
    fn test_relation_name_rejects_sql() {
        assert!("little bobby tables".parse::<RelationName>().is_err());
        assert!("t; DROP TABLE x".parse::<RelationName>().is_err());
        assert!("".parse::<RelationName>().is_err());
        assert!("materialize.public.my_view".parse::<RelationName>().is_ok());
    }

    #[test]
    fn test_missing_payload_is_missing_target() {
        assert_eq!(
            MaterializeQuery::new_default("A").tail_target(),
            Err(AppError::MissingTailTarget)
        );
        assert_eq!(
            MaterializeQuery::select("A", Some("  ;".into())).tail_target(),
            Err(AppError::MissingTailTarget)
        );
    }

    #[test]
    fn test_statement_trailing_semicolon_is_dropped() {
        let statement: SelectStatement = "SELECT 1;".parse().unwrap();
        assert_eq!(statement.as_str(), "SELECT 1");
    }
}
