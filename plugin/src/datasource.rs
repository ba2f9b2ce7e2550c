//! The data source instance the host creates for each configured datasource.
//!
//! Holds no connection of its own: every call is forwarded to the backend
//! through the transport, tagged with the instance uid.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::frame::Frame;
use common::models::health::CheckHealthResponse;
use common::models::path::Channel;
use common::models::query::{QueryDataRequest, QueryDataResponse};
use common::models::settings::DataSourceInstanceSettings;
use common::models::stream::StreamingFrameOptions;
use common::models::variable::{MetricFindValue, VariableQuery, VariableQueryPath};

use crate::stream::LiveFrameBuffer;
use crate::transport::BackendTransport;

/// Snapshots of a live channel, one per received packet.
pub type LiveStream = BoxStream<'static, AppResult<Frame>>;

pub struct DataSource {
    settings: DataSourceInstanceSettings,
    transport: Arc<dyn BackendTransport>,
}

impl DataSource {
    pub fn new(settings: DataSourceInstanceSettings, transport: Arc<dyn BackendTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn uid(&self) -> &str {
        &self.settings.uid
    }

    pub fn settings(&self) -> &DataSourceInstanceSettings {
        &self.settings
    }

    /// Hands this instance's settings to the backend.
    pub async fn register(&self) -> AppResult<()> {
        self.transport.register(&self.settings).await
    }

    /// Forwards the request unchanged.
    pub async fn query(&self, request: &QueryDataRequest) -> AppResult<QueryDataResponse> {
        self.transport.query(self.uid(), request).await
    }

    /// Buffer policy for streamed frames; the same for every request.
    pub fn stream_options(&self, _request: &QueryDataRequest) -> StreamingFrameOptions {
        StreamingFrameOptions::default()
    }

    pub async fn get_resource(&self, path: &str) -> AppResult<Value> {
        self.transport.get_resource(self.uid(), path).await
    }

    /// Names of the relations that can be tailed.
    pub async fn relations(&self) -> AppResult<Vec<String>> {
        let value = self.get_resource(VariableQueryPath::Relations.resource()).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::ExternalService(format!("unexpected relations payload: {e}")))
    }

    /// Values for a dashboard variable. Queries without a known path list nothing.
    pub async fn metric_find_query(&self, query: &VariableQuery) -> AppResult<Vec<MetricFindValue>> {
        match query.path {
            Some(VariableQueryPath::Relations) => Ok(self
                .relations()
                .await?
                .into_iter()
                .map(MetricFindValue::from)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// The "Save & test" check.
    pub async fn test_datasource(&self) -> AppResult<CheckHealthResponse> {
        self.transport.check_health(self.uid()).await
    }

    /// Follows a live channel announced by a query result.
    ///
    /// Yields the subscription snapshot first, then the buffered frame after
    /// every packet.
    pub async fn stream(&self, channel: &str, options: StreamingFrameOptions) -> AppResult<LiveStream> {
        let channel: Channel = channel.parse()?;
        if channel.datasource_uid != self.uid() {
            return Err(AppError::UnknownPath(channel.to_string()));
        }

        let subscription = self.transport.subscribe(self.uid(), &channel.path).await?;
        let mut packets = self.transport.run_stream(self.uid(), &channel.path).await?;
        let mut buffer = LiveFrameBuffer::with_initial(options, subscription.initial_data);
        tracing::info!(channel = %channel, max_length = options.max_length, "Streaming channel");

        let frames = async_stream::stream! {
            if let Some(frame) = buffer.frame() {
                yield Ok(frame.clone());
            }
            while let Some(packet) = packets.next().await {
                match packet {
                    Ok(packet) => {
                        if let Some(frame) = buffer.push(packet) {
                            yield Ok(frame.clone());
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };
        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use common::models::frame::{Field, FieldType};
    use common::models::query::MaterializeQuery;
    use common::models::stream::MAX_STREAM_LENGTH;
    use serde_json::json;

    fn datasource(transport: FakeTransport) -> (DataSource, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let settings = DataSourceInstanceSettings {
            uid: "mz".into(),
            ..Default::default()
        };
        (DataSource::new(settings, transport.clone()), transport)
    }

    fn packet(id: i64) -> Frame {
        let mut frame = Frame::new("tail");
        frame.add_field(Field::new("id", FieldType::Number, vec![json!(id)]));
        frame
    }

    #[tokio::test]
    async fn test_query_is_forwarded_unchanged() {
        let (datasource, transport) = datasource(FakeTransport::default());
        let request = QueryDataRequest {
            queries: vec![
                MaterializeQuery::relation("A", Some("t".into())),
                MaterializeQuery::select("B", Some("SELECT 1".into())),
            ],
        };
        datasource.query(&request).await.unwrap();
        assert_eq!(transport.queries(), vec![("mz".to_string(), request)]);
    }

    #[tokio::test]
    async fn test_stream_options_are_fixed() {
        let (datasource, _) = datasource(FakeTransport::default());
        let options = datasource.stream_options(&QueryDataRequest { queries: vec![] });
        assert_eq!(options.max_length, MAX_STREAM_LENGTH);
        assert_eq!(serde_json::to_value(options).unwrap(), json!({"maxLength": 10000}));
    }

    #[tokio::test]
    async fn test_metric_find_relations() {
        let (datasource, transport) =
            datasource(FakeTransport::default().with_resource("relations", json!(["a", "b"])));
        let query = VariableQuery {
            path: Some(VariableQueryPath::Relations),
        };
        let values = datasource.metric_find_query(&query).await.unwrap();
        assert_eq!(
            values,
            vec![
                MetricFindValue { text: "a".into() },
                MetricFindValue { text: "b".into() }
            ]
        );
        assert_eq!(transport.resources(), vec!["relations".to_string()]);
    }

    #[tokio::test]
    async fn test_metric_find_without_path_is_empty() {
        let (datasource, transport) = datasource(FakeTransport::default());
        let query: VariableQuery = serde_json::from_str(r#"{"path": "tasks"}"#).unwrap();
        assert!(datasource.metric_find_query(&query).await.unwrap().is_empty());
        assert!(datasource
            .metric_find_query(&VariableQuery::default())
            .await
            .unwrap()
            .is_empty());
        assert!(transport.resources().is_empty());
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let (datasource, _) = datasource(FakeTransport::default());
        let query = VariableQuery {
            path: Some(VariableQueryPath::Relations),
        };
        assert!(matches!(
            datasource.metric_find_query(&query).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_and_health() {
        let (datasource, transport) =
            datasource(FakeTransport::default().with_health(CheckHealthResponse::ok()));
        datasource.register().await.unwrap();
        assert_eq!(transport.registered(), vec![datasource.settings().clone()]);
        assert_eq!(
            datasource.test_datasource().await.unwrap().message,
            "Connection successful"
        );
    }

    #[tokio::test]
    async fn test_stream_buffers_packets() {
        let (datasource, _) = datasource(
            FakeTransport::default()
                .with_initial_data(packet(1))
                .with_packets(vec![Ok(packet(2)), Ok(packet(3))]),
        );
        let frames: Vec<_> = datasource
            .stream("ds/mz/tail/relation/t", StreamingFrameOptions { max_length: 2 })
            .await
            .unwrap()
            .collect()
            .await;

        let rows: Vec<_> = frames
            .into_iter()
            .map(|f| f.unwrap().fields[0].values.clone())
            .collect();
        assert_eq!(
            rows,
            vec![
                vec![json!(1)],
                vec![json!(1), json!(2)],
                vec![json!(2), json!(3)],
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_stops_at_first_error() {
        let (datasource, _) = datasource(FakeTransport::default().with_packets(vec![
            Ok(packet(1)),
            Err(AppError::ExternalService("gone".into())),
            Ok(packet(2)),
        ]));
        let frames: Vec<_> = datasource
            .stream("ds/mz/tail/relation/t", StreamingFrameOptions::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 2);
        assert!(frames[1].is_err());
    }

    #[tokio::test]
    async fn test_stream_rejects_other_datasource() {
        let (datasource, _) = datasource(FakeTransport::default());
        assert!(matches!(
            datasource
                .stream("ds/other/tail/relation/t", StreamingFrameOptions::default())
                .await,
            Err(AppError::UnknownPath(_))
        ));
    }
}
