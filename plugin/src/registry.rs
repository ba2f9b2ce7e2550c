//! Plugin registration.
//!
//! The host discovers the plugin by its identifier and uses the registered
//! factories to create the data source and the three editors.

use std::collections::HashMap;
use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::query::MaterializeQuery;
use common::models::settings::{DataSourceInstanceSettings, DataSourceSettings};
use common::models::variable::VariableQuery;

use crate::datasource::DataSource;
use crate::editors::{
    ConfigEditor, OptionsHost, QueryEditor, QueryEditorHost, VariableQueryEditor,
    VariableQueryHost,
};
use crate::transport::BackendTransport;

/// Identifier the host knows this plugin by.
pub const PLUGIN_ID: &str = "grafana-materialize-datasource";

pub type DataSourceFactory = Arc<dyn Fn(DataSourceInstanceSettings) -> DataSource + Send + Sync>;

pub type ConfigEditorFactory =
    fn(DataSourceSettings, Box<dyn OptionsHost + Send>) -> ConfigEditor<Box<dyn OptionsHost + Send>>;

pub type QueryEditorFactory = fn(
    MaterializeQuery,
    Box<dyn QueryEditorHost + Send>,
) -> QueryEditor<Box<dyn QueryEditorHost + Send>>;

pub type VariableQueryEditorFactory = fn(
    VariableQuery,
    Box<dyn VariableQueryHost + Send>,
) -> VariableQueryEditor<Box<dyn VariableQueryHost + Send>>;

/// A data source plugin: how to build instances and which editors it offers.
#[derive(Clone)]
pub struct DataSourcePlugin {
    id: String,
    datasource: DataSourceFactory,
    config_editor: Option<ConfigEditorFactory>,
    query_editor: Option<QueryEditorFactory>,
    variable_query_editor: Option<VariableQueryEditorFactory>,
}

impl DataSourcePlugin {
    pub fn new(id: impl Into<String>, datasource: DataSourceFactory) -> Self {
        Self {
            id: id.into(),
            datasource,
            config_editor: None,
            query_editor: None,
            variable_query_editor: None,
        }
    }

    pub fn set_config_editor(mut self, factory: ConfigEditorFactory) -> Self {
        self.config_editor = Some(factory);
        self
    }

    pub fn set_query_editor(mut self, factory: QueryEditorFactory) -> Self {
        self.query_editor = Some(factory);
        self
    }

    pub fn set_variable_query_editor(mut self, factory: VariableQueryEditorFactory) -> Self {
        self.variable_query_editor = Some(factory);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn create_datasource(&self, settings: DataSourceInstanceSettings) -> DataSource {
        (self.datasource)(settings)
    }

    pub fn config_editor(&self) -> Option<ConfigEditorFactory> {
        self.config_editor
    }

    pub fn query_editor(&self) -> Option<QueryEditorFactory> {
        self.query_editor
    }

    pub fn variable_query_editor(&self) -> Option<VariableQueryEditorFactory> {
        self.variable_query_editor
    }
}

/// The Materialize data source with all three editors.
pub fn materialize_plugin(transport: Arc<dyn BackendTransport>) -> DataSourcePlugin {
    let datasource: DataSourceFactory =
        Arc::new(move |settings| DataSource::new(settings, transport.clone()));
    DataSourcePlugin::new(PLUGIN_ID, datasource)
        .set_config_editor(ConfigEditor::new)
        .set_query_editor(QueryEditor::new)
        .set_variable_query_editor(VariableQueryEditor::new)
}

/// Plugins known to the host, keyed by identifier.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, DataSourcePlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: DataSourcePlugin) -> AppResult<()> {
        if self.plugins.contains_key(plugin.id()) {
            return Err(AppError::AlreadyRegistered(plugin.id().to_string()));
        }
        tracing::info!(plugin = %plugin.id(), "Plugin registered");
        self.plugins.insert(plugin.id().to_string(), plugin);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&DataSourcePlugin> {
        self.plugins.get(id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use common::models::query::Target;
    use common::models::variable::VariableQueryPath;

    struct NullHost;

    impl OptionsHost for NullHost {
        fn on_options_change(&mut self, _settings: DataSourceSettings) {}
    }

    impl QueryEditorHost for NullHost {
        fn on_change(&mut self, _query: MaterializeQuery) {}
        fn on_run_query(&mut self) {}
    }

    impl VariableQueryHost for NullHost {
        fn on_change(&mut self, _query: VariableQuery, _path: Option<VariableQueryPath>) {}
    }

    fn plugin() -> DataSourcePlugin {
        materialize_plugin(Arc::new(FakeTransport::default()))
    }

    #[test]
    fn test_plugin_offers_every_editor() {
        let plugin = plugin();
        assert_eq!(plugin.id(), PLUGIN_ID);

        let config = plugin.config_editor().unwrap()(DataSourceSettings::default(), Box::new(NullHost));
        assert_eq!(config.fields().len(), 4);

        let query = plugin.query_editor().unwrap()(MaterializeQuery::new_default("A"), Box::new(NullHost));
        assert_eq!(query.target(), Target::Relation);

        let variable = plugin.variable_query_editor().unwrap()(VariableQuery::default(), Box::new(NullHost));
        assert_eq!(variable.draft(), &VariableQuery::default());
    }

    #[test]
    fn test_factory_creates_instances() {
        let settings = DataSourceInstanceSettings {
            uid: "mz".into(),
            ..Default::default()
        };
        assert_eq!(plugin().create_datasource(settings).uid(), "mz");
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(plugin()).unwrap();
        assert_eq!(
            registry.register(plugin()),
            Err(AppError::AlreadyRegistered(PLUGIN_ID.into()))
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.get(PLUGIN_ID).is_some());
    }
}
