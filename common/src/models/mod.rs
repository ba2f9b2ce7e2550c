//! Data contracts shared by the backend and the plugin adapter.

pub mod frame;
pub mod health;
pub mod path;
pub mod query;
pub mod settings;
pub mod stream;
pub mod variable;

// Re-export commonly used types
pub use frame::{Field, FieldType, Frame, FrameMeta};
pub use health::{CheckHealthResponse, HealthStatus};
pub use path::{Channel, Path, PathDisplay, QueryId, TailPath};
pub use query::{
    DataResponse, MaterializeQuery, Operation, QueryDataRequest, QueryDataResponse, QueryTarget,
    RelationName, SelectStatement, TailTarget, Target,
};
pub use settings::{
    ConnectionParams, DataSourceInstanceSettings, DataSourceOptions, DataSourceSettings,
    SecureOptions,
};
pub use stream::{StreamingFrameOptions, SubscribeStreamResponse, SubscribeStreamStatus};
pub use variable::{MetricFindValue, VariableQuery, VariableQueryPath};
