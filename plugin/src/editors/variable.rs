//! Dashboard variable query form.

use common::models::variable::{VariableQuery, VariableQueryPath};

use crate::editors::SelectOption;

/// Receives the committed variable query and the path that was picked.
pub trait VariableQueryHost {
    fn on_change(&mut self, query: VariableQuery, path: Option<VariableQueryPath>);
}

impl<T: VariableQueryHost + ?Sized> VariableQueryHost for Box<T> {
    fn on_change(&mut self, query: VariableQuery, path: Option<VariableQueryPath>) {
        (**self).on_change(query, path)
    }
}

pub fn path_options() -> Vec<SelectOption<VariableQueryPath>> {
    vec![SelectOption::new("Relations", VariableQueryPath::Relations)
        .with_description("Query available relations.")]
}

/// Keeps a draft of the query; the host only hears about it on blur.
pub struct VariableQueryEditor<H> {
    draft: VariableQuery,
    host: H,
}

impl<H: VariableQueryHost> VariableQueryEditor<H> {
    pub fn new(query: VariableQuery, host: H) -> Self {
        Self { draft: query, host }
    }

    pub fn draft(&self) -> &VariableQuery {
        &self.draft
    }

    pub fn on_path_change(&mut self, path: Option<VariableQueryPath>) {
        self.draft.path = path;
    }

    pub fn on_blur(&mut self) {
        self.host.on_change(self.draft.clone(), self.draft.path);
    }
}
