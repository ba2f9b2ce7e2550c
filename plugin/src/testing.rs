//! In-memory backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::frame::Frame;
use common::models::health::CheckHealthResponse;
use common::models::query::{QueryDataRequest, QueryDataResponse};
use common::models::settings::DataSourceInstanceSettings;
use common::models::stream::SubscribeStreamResponse;

use crate::transport::{BackendTransport, FrameStream};

#[derive(Default)]
pub struct FakeTransport {
    resources: HashMap<String, Value>,
    initial_data: Option<Frame>,
    packets: Mutex<Vec<AppResult<Frame>>>,
    health: Option<CheckHealthResponse>,
    registered: Mutex<Vec<DataSourceInstanceSettings>>,
    queries: Mutex<Vec<(String, QueryDataRequest)>>,
    resource_calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn with_resource(mut self, path: &str, value: Value) -> Self {
        self.resources.insert(path.to_string(), value);
        self
    }

    pub fn with_initial_data(mut self, frame: Frame) -> Self {
        self.initial_data = Some(frame);
        self
    }

    pub fn with_packets(self, packets: Vec<AppResult<Frame>>) -> Self {
        *self.packets.lock().unwrap() = packets;
        self
    }

    pub fn with_health(mut self, health: CheckHealthResponse) -> Self {
        self.health = Some(health);
        self
    }

    pub fn registered(&self) -> Vec<DataSourceInstanceSettings> {
        self.registered.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, QueryDataRequest)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn resources(&self) -> Vec<String> {
        self.resource_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendTransport for FakeTransport {
    async fn register(&self, settings: &DataSourceInstanceSettings) -> AppResult<()> {
        self.registered.lock().unwrap().push(settings.clone());
        Ok(())
    }

    async fn query(&self, uid: &str, request: &QueryDataRequest) -> AppResult<QueryDataResponse> {
        self.queries
            .lock()
            .unwrap()
            .push((uid.to_string(), request.clone()));
        Ok(QueryDataResponse::default())
    }

    async fn get_resource(&self, _uid: &str, path: &str) -> AppResult<Value> {
        self.resource_calls.lock().unwrap().push(path.to_string());
        self.resources
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(path.to_string()))
    }

    async fn check_health(&self, uid: &str) -> AppResult<CheckHealthResponse> {
        self.health
            .clone()
            .ok_or_else(|| AppError::DatasourceNotFound(uid.to_string()))
    }

    async fn subscribe(&self, _uid: &str, _path: &str) -> AppResult<SubscribeStreamResponse> {
        Ok(match &self.initial_data {
            Some(frame) => SubscribeStreamResponse::ok(frame.clone()),
            None => SubscribeStreamResponse::ok(Frame::new("tail")),
        })
    }

    async fn run_stream(&self, _uid: &str, _path: &str) -> AppResult<FrameStream> {
        let packets = std::mem::take(&mut *self.packets.lock().unwrap());
        Ok(futures_util::stream::iter(packets).boxed())
    }
}
