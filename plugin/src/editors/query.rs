//! Panel query form.
//!
//! The user picks a target kind, then either a relation from the list the
//! backend offers or a free-text select statement. Edits are reported as they
//! happen; the query only runs when the relation selector or statement input
//! loses focus.

use common::errors::AppResult;
use common::models::query::{MaterializeQuery, QueryTarget, Target};

use crate::datasource::DataSource;
use crate::editors::SelectOption;

/// Receives edits and run requests from the query editor.
pub trait QueryEditorHost {
    fn on_change(&mut self, query: MaterializeQuery);
    fn on_run_query(&mut self);
}

impl<T: QueryEditorHost + ?Sized> QueryEditorHost for Box<T> {
    fn on_change(&mut self, query: MaterializeQuery) {
        (**self).on_change(query)
    }

    fn on_run_query(&mut self) {
        (**self).on_run_query()
    }
}

/// Ticket for one relation-list fetch.
///
/// Only the most recently issued ticket can fill the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "start the fetch and hand its result to `relations_loaded`"]
pub struct RelationsFetch {
    generation: u64,
}

pub fn target_options() -> Vec<SelectOption<Target>> {
    vec![
        SelectOption::new("Relation", Target::Relation)
            .with_description("Tail the output of a source, table or view."),
        SelectOption::new("Select statement", Target::Select)
            .with_description("Tail the results of a select statement."),
    ]
}

pub struct QueryEditor<H> {
    query: MaterializeQuery,
    host: H,
    relations: Vec<SelectOption<String>>,
    generation: u64,
    // Last payload of each kind, restored when switching back.
    name: Option<String>,
    statement: Option<String>,
}

impl<H: QueryEditorHost> QueryEditor<H> {
    pub fn new(query: MaterializeQuery, host: H) -> Self {
        let name = query.name().map(str::to_string);
        let statement = query.statement().map(str::to_string);
        Self {
            query,
            host,
            relations: Vec::new(),
            generation: 0,
            name,
            statement,
        }
    }

    pub fn query(&self) -> &MaterializeQuery {
        &self.query
    }

    pub fn target(&self) -> Target {
        self.query.kind()
    }

    /// Options of the relation selector, empty until a fetch completes.
    pub fn relations(&self) -> &[SelectOption<String>] {
        &self.relations
    }

    /// Called once the form is shown; a relation query needs its list.
    pub fn mount(&mut self) -> Option<RelationsFetch> {
        (self.target() == Target::Relation).then(|| self.begin_fetch())
    }

    /// Takes a query pushed by the host. A change of target kind behaves as
    /// it does when made through the selector, minus the notification.
    pub fn set_query(&mut self, query: MaterializeQuery) -> Option<RelationsFetch> {
        let previous = self.target();
        self.remember(&query);
        self.query = query;
        self.fetch_if_switched_to_relation(previous)
    }

    /// A cleared selection falls back to [`Target::Relation`].
    pub fn on_target_change(&mut self, target: Option<Target>) -> Option<RelationsFetch> {
        let previous = self.target();
        let target = target.unwrap_or_default();
        let payload = match target {
            Target::Relation => QueryTarget::Relation {
                name: self.name.clone(),
            },
            Target::Select => QueryTarget::Select {
                statement: self.statement.clone(),
            },
        };
        self.query.target = payload;
        self.host.on_change(self.query.clone());
        self.fetch_if_switched_to_relation(previous)
    }

    /// Ignored unless the query currently tails a relation.
    pub fn on_relation_change(&mut self, name: Option<String>) {
        if let QueryTarget::Relation { name: current } = &mut self.query.target {
            *current = name.clone();
            self.name = name;
            self.host.on_change(self.query.clone());
        }
    }

    /// Ignored unless the query currently tails a select statement.
    pub fn on_statement_change(&mut self, statement: &str) {
        if let QueryTarget::Select { statement: current } = &mut self.query.target {
            *current = Some(statement.to_string());
            self.statement = Some(statement.to_string());
            self.host.on_change(self.query.clone());
        }
    }

    /// The relation selector or statement input lost focus.
    pub fn on_blur(&mut self) {
        self.host.on_run_query();
    }

    /// Applies the outcome of a fetch, returning whether it was used.
    ///
    /// Outdated tickets are dropped, as are results arriving after the
    /// target moved away from relations. A failed fetch leaves the list empty.
    pub fn relations_loaded(
        &mut self,
        fetch: RelationsFetch,
        result: AppResult<Vec<String>>,
    ) -> bool {
        if fetch.generation != self.generation || self.target() != Target::Relation {
            tracing::debug!(
                generation = fetch.generation,
                latest = self.generation,
                "Dropping outdated relation list"
            );
            return false;
        }
        match result {
            Ok(names) => {
                self.relations = names
                    .into_iter()
                    .map(|name| SelectOption::new(name.clone(), name))
                    .collect();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load relations");
                self.relations.clear();
            }
        }
        true
    }

    /// Runs a fetch against `datasource` and applies it.
    pub async fn load_relations(&mut self, datasource: &DataSource, fetch: RelationsFetch) -> bool {
        let result = datasource.relations().await;
        self.relations_loaded(fetch, result)
    }

    fn begin_fetch(&mut self) -> RelationsFetch {
        self.generation += 1;
        self.relations.clear();
        RelationsFetch {
            generation: self.generation,
        }
    }

    fn fetch_if_switched_to_relation(&mut self, previous: Target) -> Option<RelationsFetch> {
        (previous != Target::Relation && self.target() == Target::Relation)
            .then(|| self.begin_fetch())
    }

    fn remember(&mut self, query: &MaterializeQuery) {
        match &query.target {
            QueryTarget::Relation { name } => self.name = name.clone(),
            QueryTarget::Select { statement } => self.statement = statement.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::AppError;

    #[derive(Default)]
    struct RecordingHost {
        changes: Vec<MaterializeQuery>,
        runs: usize,
    }

    impl QueryEditorHost for RecordingHost {
        fn on_change(&mut self, query: MaterializeQuery) {
            self.changes.push(query);
        }

        fn on_run_query(&mut self) {
            self.runs += 1;
        }
    }

    fn editor(query: MaterializeQuery) -> QueryEditor<RecordingHost> {
        QueryEditor::new(query, RecordingHost::default())
    }

    #[test]
    fn test_target_options() {
        let options = target_options();
        assert_eq!(options[0].value, Target::Relation);
        assert_eq!(
            options[1].description,
            Some("Tail the results of a select statement.")
        );
    }

    #[test]
    fn test_mount_fetches_for_relation_only() {
        assert!(editor(MaterializeQuery::new_default("A")).mount().is_some());
        assert!(editor(MaterializeQuery::select("A", None)).mount().is_none());
    }

    #[test]
    fn test_relation_change_only_touches_name() {
        let mut editor = editor(MaterializeQuery::new_default("A"));
        editor.on_relation_change(Some("my_view".into()));
        assert_eq!(
            editor.host.changes,
            vec![MaterializeQuery::relation("A", Some("my_view".into()))]
        );
        assert_eq!(editor.host.runs, 0);
    }

    #[test]
    fn test_statement_change_only_touches_statement() {
        let mut editor = editor(MaterializeQuery::select("A", None));
        editor.on_statement_change("SELECT 1");
        assert_eq!(
            editor.host.changes,
            vec![MaterializeQuery::select("A", Some("SELECT 1".into()))]
        );
    }

    #[test]
    fn test_stale_edits_are_ignored() {
        let mut select = editor(MaterializeQuery::select("A", None));
        select.on_relation_change(Some("my_view".into()));
        assert!(select.host.changes.is_empty());

        let mut relation = editor(MaterializeQuery::new_default("A"));
        relation.on_statement_change("SELECT 1");
        assert!(relation.host.changes.is_empty());
    }

    #[test]
    fn test_switching_back_and_forth_runs_nothing() {
        let mut editor = editor(MaterializeQuery::relation("A", Some("t".into())));
        let _ = editor.on_target_change(Some(Target::Select));
        let _ = editor.on_target_change(Some(Target::Relation));
        assert_eq!(editor.host.runs, 0);
        assert_eq!(editor.host.changes.len(), 2);
        assert_eq!(editor.query().name(), Some("t"));
    }

    #[test]
    fn test_blur_runs_query() {
        let mut editor = editor(MaterializeQuery::select("A", None));
        editor.on_statement_change("SELECT 1");
        editor.on_blur();
        assert_eq!(editor.host.runs, 1);
    }

    #[test]
    fn test_cleared_target_defaults_to_relation() {
        let mut editor = editor(MaterializeQuery::select("A", Some("SELECT 1".into())));
        assert!(editor.on_target_change(None).is_some());
        assert_eq!(editor.target(), Target::Relation);
    }

    #[test]
    fn test_only_latest_fetch_applies() {
        let mut editor = editor(MaterializeQuery::new_default("A"));
        let first = editor.mount().unwrap();
        let _ = editor.on_target_change(Some(Target::Select));
        let second = editor.on_target_change(Some(Target::Relation)).unwrap();

        assert!(!editor.relations_loaded(first, Ok(vec!["old".into()])));
        assert!(editor.relations().is_empty());
        assert!(editor.relations_loaded(second, Ok(vec!["a".into(), "b".into()])));
        let names: Vec<_> = editor.relations().iter().map(|o| o.value.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_fetch_after_switching_away_is_dropped() {
        let mut editor = editor(MaterializeQuery::new_default("A"));
        let fetch = editor.mount().unwrap();
        let _ = editor.on_target_change(Some(Target::Select));
        assert!(!editor.relations_loaded(fetch, Ok(vec!["a".into()])));
        assert!(editor.relations().is_empty());
    }

    #[test]
    fn test_failed_fetch_leaves_list_empty() {
        let mut editor = editor(MaterializeQuery::new_default("A"));
        let fetch = editor.mount().unwrap();
        assert!(editor.relations_loaded(fetch, Err(AppError::ExternalService("down".into()))));
        assert!(editor.relations().is_empty());
    }

    #[test]
    fn test_set_query_switching_to_relation_fetches() {
        let mut editor = editor(MaterializeQuery::select("A", None));
        assert!(editor
            .set_query(MaterializeQuery::relation("A", Some("t".into())))
            .is_some());
        assert!(editor.host.changes.is_empty());
    }

    #[test]
    fn test_statement_survives_relation_edit() {
        let mut editor = editor(MaterializeQuery::select("A", Some("SELECT 1".into())));
        let _ = editor.on_target_change(Some(Target::Relation));
        editor.on_relation_change(Some("my_view".into()));
        let _ = editor.on_target_change(Some(Target::Select));

        assert_eq!(editor.host.runs, 0);
        assert_eq!(
            editor.host.changes,
            vec![
                MaterializeQuery::relation("A", None),
                MaterializeQuery::relation("A", Some("my_view".into())),
                MaterializeQuery::select("A", Some("SELECT 1".into())),
            ]
        );

        let _ = editor.on_target_change(Some(Target::Relation));
        assert_eq!(editor.query().name(), Some("my_view"));
    }
}
