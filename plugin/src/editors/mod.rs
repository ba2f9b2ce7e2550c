//! Headless editors backing the host's forms.
//!
//! Each editor owns the state of one form and reports edits through a host
//! trait; rendering is left to the host.

pub mod config;
pub mod query;
pub mod variable;

pub use config::{ConfigEditor, FieldDescriptor, FieldKind, OptionsHost, SecretState};
pub use query::{QueryEditor, QueryEditorHost, RelationsFetch};
pub use variable::{VariableQueryEditor, VariableQueryHost};

/// An entry of a select input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption<T> {
    pub label: String,
    pub value: T,
    pub description: Option<&'static str>,
}

impl<T> SelectOption<T> {
    pub fn new(label: impl Into<String>, value: T) -> Self {
        Self {
            label: label.into(),
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}
