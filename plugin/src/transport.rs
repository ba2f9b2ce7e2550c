//! How the plugin reaches the backend service.
//!
//! Every call goes through [`BackendTransport`]; [`HttpTransport`] is the
//! implementation used in production, speaking to the backend's HTTP API and
//! reading live streams as server-sent events.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde_json::Value;

use common::config::ServiceUrls;
use common::errors::{AppError, AppResult};
use common::middleware::request_id::{RequestId, REQUEST_ID_HEADER};
use common::models::frame::Frame;
use common::models::health::CheckHealthResponse;
use common::models::query::{QueryDataRequest, QueryDataResponse};
use common::models::settings::DataSourceInstanceSettings;
use common::models::stream::{SubscribeStreamResponse, STREAM_ERROR_EVENT, STREAM_PACKET_EVENT};
use common::response::ApiResponse;

/// Frames pushed by a running stream, in arrival order.
pub type FrameStream = BoxStream<'static, AppResult<Frame>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls the plugin makes on the backend for one datasource instance.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Hands the instance settings to the backend.
    async fn register(&self, settings: &DataSourceInstanceSettings) -> AppResult<()>;

    async fn query(&self, uid: &str, request: &QueryDataRequest) -> AppResult<QueryDataResponse>;

    /// Fetches a named resource, e.g. `relations`.
    async fn get_resource(&self, uid: &str, path: &str) -> AppResult<Value>;

    async fn check_health(&self, uid: &str) -> AppResult<CheckHealthResponse>;

    async fn subscribe(&self, uid: &str, path: &str) -> AppResult<SubscribeStreamResponse>;

    async fn run_stream(&self, uid: &str, path: &str) -> AppResult<FrameStream>;
}

/// [`BackendTransport`] over the backend's HTTP API.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> AppResult<Self> {
        // No overall timeout: stream responses stay open indefinitely.
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::ExternalService(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Targets the backend named by `BACKEND_URL`.
    pub fn from_env() -> AppResult<Self> {
        Self::new(ServiceUrls::load().backend)
    }

    fn url(&self, uid: &str, suffix: &str) -> String {
        format!("{}/api/datasources/{}{}", self.base_url, uid, suffix)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        let request_id = RequestId::new();
        let mut request = request;
        if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
            request = request.header(REQUEST_ID_HEADER.clone(), value);
        }
        request.send().await.map_err(|e| {
            tracing::warn!(request_id = %request_id, error = %e, "Backend request failed");
            AppError::ExternalService(format!("could not reach backend: {e}"))
        })
    }

    /// Sends a request and unwraps the envelope of its answer.
    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> AppResult<T> {
        let response = self.send(request).await?;
        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
        AppError::ExternalService(format!("backend returned an invalid response ({status}): {e}"))
    })?;
    envelope.into_result()
}

#[async_trait]
impl BackendTransport for HttpTransport {
    async fn register(&self, settings: &DataSourceInstanceSettings) -> AppResult<()> {
        let request = self.http_client.put(self.url(&settings.uid, "")).json(settings);
        self.call::<bool>(request).await.map(|_| ())
    }

    async fn query(&self, uid: &str, request: &QueryDataRequest) -> AppResult<QueryDataResponse> {
        let request = self.http_client.post(self.url(uid, "/query")).json(request);
        self.call(request).await
    }

    async fn get_resource(&self, uid: &str, path: &str) -> AppResult<Value> {
        let suffix = format!("/resources/{}", path.trim_start_matches('/'));
        self.call(self.http_client.get(self.url(uid, &suffix))).await
    }

    async fn check_health(&self, uid: &str) -> AppResult<CheckHealthResponse> {
        self.call(self.http_client.get(self.url(uid, "/health"))).await
    }

    async fn subscribe(&self, uid: &str, path: &str) -> AppResult<SubscribeStreamResponse> {
        let suffix = format!("/stream/subscribe/{}", path.trim_start_matches('/'));
        self.call(self.http_client.post(self.url(uid, &suffix))).await
    }

    async fn run_stream(&self, uid: &str, path: &str) -> AppResult<FrameStream> {
        let suffix = format!("/stream/run/{}", path.trim_start_matches('/'));
        let request = self
            .http_client
            .get(self.url(uid, &suffix))
            .header(ACCEPT, "text/event-stream");
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(read_envelope::<Value>(response)
                .await
                .err()
                .unwrap_or_else(|| AppError::ExternalService("stream was refused".into())));
        }

        let mut body = response.bytes_stream();
        let frames = async_stream::stream! {
            let mut buffer = SseBuffer::default();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::ExternalService(format!("stream interrupted: {e}")));
                        return;
                    }
                };
                let events = match buffer.push(&chunk) {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for event in events {
                    match event.into_frame() {
                        Ok(Some(frame)) => yield Ok(frame),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };
        Ok(frames.boxed())
    }
}

/// A single server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    /// Decodes a stream event; unrelated events yield `None`.
    fn into_frame(self) -> AppResult<Option<Frame>> {
        match self.event.as_str() {
            STREAM_PACKET_EVENT => serde_json::from_str(&self.data)
                .map(Some)
                .map_err(|e| AppError::ExternalService(format!("invalid stream packet: {e}"))),
            STREAM_ERROR_EVENT => Err(AppError::ExternalService(self.data)),
            _ => Ok(None),
        }
    }
}

/// Largest event the buffer holds before giving up on the stream.
pub const MAX_EVENT_BYTES: usize = 16 * 1024 * 1024;

/// Accumulates response bytes and splits them into complete events.
#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
    // Bytes of `pending` already searched for a separator.
    scanned: usize,
}

impl SseBuffer {
    /// Fails once an unterminated event grows past [`MAX_EVENT_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> AppResult<Vec<SseEvent>> {
        self.pending.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
        let mut events = Vec::new();
        let mut start = 0;
        // A separator may straddle the previous chunk.
        let mut from = self.scanned.saturating_sub(1);
        while let Some(at) = self.pending[from..].windows(2).position(|w| w == b"\n\n") {
            let end = from + at + 2;
            if let Some(event) = parse_event(&String::from_utf8_lossy(&self.pending[start..end])) {
                events.push(event);
            }
            start = end;
            from = end;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > MAX_EVENT_BYTES {
            self.pending.clear();
            self.scanned = 0;
            return Err(AppError::ExternalService(format!(
                "stream event exceeds {MAX_EVENT_BYTES} bytes"
            )));
        }
        Ok(events)
    }
}

/// Parses one event block. Comment-only blocks (keep-alives) yield `None`.
fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent {
        event: "message".to_string(),
        data: String::new(),
    };
    let mut has_data = false;
    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event.event = value.to_string(),
            "data" => {
                if has_data {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                has_data = true;
            }
            _ => {}
        }
    }
    has_data.then_some(event)
}
