//! Server-sent event stream carrying the output of a running `TAIL`.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use sqlx::{Connection, PgConnection};

use common::errors::AppError;
use common::models::frame::Frame;
use common::models::stream::{STREAM_ERROR_EVENT, STREAM_PACKET_EVENT};

use crate::convert::rows_to_frame;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn frame_event(frame: &Frame) -> Event {
    Event::default()
        .event(STREAM_PACKET_EVENT)
        .data(serde_json::to_string(frame).unwrap_or_default())
}

fn error_event(error: &AppError) -> Event {
    Event::default()
        .event(STREAM_ERROR_EVENT)
        .data(error.to_string())
}

/// Runs `sql` on `connection` and emits one frame per row it returns.
///
/// The stream owns the connection. The first failure is sent as an `error`
/// event and ends the stream. Dropping the stream closes the connection, which
/// cancels the `TAIL` on the server.
pub fn tail_events(
    mut connection: PgConnection,
    sql: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        tracing::info!(sql = %sql, "Starting tail");
        {
            let mut rows = sqlx::query(&sql).fetch(&mut connection);
            while let Some(row) = rows.next().await {
                let frame = row
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))
                    .and_then(|row| rows_to_frame(std::slice::from_ref(&row)));
                match frame {
                    Ok(frame) => yield Ok(frame_event(&frame)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Tail stream failed");
                        yield Ok(error_event(&e));
                        break;
                    }
                }
            }
        }
        if let Err(e) = connection.close().await {
            tracing::debug!(error = %e, "Closing tail connection failed");
        }
        tracing::info!(sql = %sql, "Tail ended");
    }
}

/// Wraps an event stream with the keep-alive pings every stream response uses.
pub fn sse_response<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}
