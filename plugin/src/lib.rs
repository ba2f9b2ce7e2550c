//! Front-end adapter of the Materialize TAIL data source.
//!
//! Provides the pieces a dashboard host plugs in:
//! - the connection settings, panel query and variable query editors
//! - the data source instance forwarding queries and resource calls
//! - the transport to the backend service and live stream buffering

pub mod datasource;
pub mod editors;
pub mod registry;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod testing;

pub use datasource::{DataSource, LiveStream};
pub use registry::{materialize_plugin, DataSourcePlugin, PluginRegistry, PLUGIN_ID};
pub use stream::LiveFrameBuffer;
pub use transport::{BackendTransport, FrameStream, HttpTransport};
