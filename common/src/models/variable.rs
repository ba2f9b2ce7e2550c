//! Variable queries, used when populating dashboard variable values.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What a variable query lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VariableQueryPath {
    /// Query for available relations.
    Relations,
}

impl VariableQueryPath {
    /// The backend resource answering this path.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Relations => "relations",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VariableQuery {
    /// Unrecognised paths deserialize as absent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_path"
    )]
    pub path: Option<VariableQueryPath>,
}

fn lenient_path<'de, D>(deserializer: D) -> Result<Option<VariableQueryPath>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// A single value offered to a dashboard variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetricFindValue {
    pub text: String,
}

impl From<String> for MetricFindValue {
    fn from(text: String) -> Self {
        Self { text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relations_path() {
        let query: VariableQuery = serde_json::from_str(r#"{"path": "relations"}"#).unwrap();
        assert_eq!(query.path, Some(VariableQueryPath::Relations));
        assert_eq!(VariableQueryPath::Relations.resource(), "relations");
    }

    #[test]
    fn test_unknown_or_missing_path_is_none() {
        let unknown: VariableQuery = serde_json::from_str(r#"{"path": "tasks"}"#).unwrap();
        assert_eq!(unknown.path, None);
        let missing: VariableQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.path, None);
    }
}
