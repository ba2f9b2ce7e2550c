//! Columnar data frames, the unit of data the host renders.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    String,
    Boolean,
    /// Milliseconds since the Unix epoch.
    Time,
}

/// A single named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            field_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FrameMeta {
    /// Live channel the host should subscribe to for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Frame {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            meta: None,
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn set_channel(&mut self, channel: impl Into<String>) {
        self.meta.get_or_insert_with(FrameMeta::default).channel = Some(channel.into());
    }

    pub fn channel(&self) -> Option<&str> {
        self.meta.as_ref()?.channel.as_deref()
    }

    /// Number of rows, taken from the first field.
    pub fn row_count(&self) -> usize {
        self.fields.first().map_or(0, Field::len)
    }

    /// Checks that every field holds the same number of values.
    pub fn check(self) -> AppResult<Self> {
        let rows = self.row_count();
        if let Some(field) = self.fields.iter().find(|f| f.len() != rows) {
            return Err(AppError::Data(format!(
                "field {} has {} values, expected {}",
                field.name,
                field.len(),
                rows
            )));
        }
        Ok(self)
    }

    /// Whether `other` carries the same columns, in the same order.
    pub fn same_schema(&self, other: &Frame) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.field_type == b.field_type)
    }
}
