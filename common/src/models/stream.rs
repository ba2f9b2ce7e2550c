//! Streaming contracts between the host, the plugin adapter and the backend.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::frame::Frame;

/// Most rows the host retains per streamed frame.
pub const MAX_STREAM_LENGTH: usize = 10_000;

/// Buffer policy handed to the host for streamed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamingFrameOptions {
    pub max_length: usize,
}

impl Default for StreamingFrameOptions {
    fn default() -> Self {
        Self {
            max_length: MAX_STREAM_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeStreamStatus {
    Ok,
    NotFound,
    PermissionDenied,
}

/// Answer to a new subscriber: a status and the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeStreamResponse {
    pub status: SubscribeStreamStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Frame>,
}

impl SubscribeStreamResponse {
    pub fn ok(initial_data: Frame) -> Self {
        Self {
            status: SubscribeStreamStatus::Ok,
            initial_data: Some(initial_data),
        }
    }
}

/// Name of the server-sent event carrying a [`Frame`] on a running stream.
pub const STREAM_PACKET_EVENT: &str = "frame";
/// Name of the server-sent event reporting a stream failure.
pub const STREAM_ERROR_EVENT: &str = "error";
