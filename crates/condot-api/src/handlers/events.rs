//! SSE event stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use condot_core::defaults::SSE_KEEPALIVE_SECS;
use condot_core::EventEnvelope;

use crate::AppState;

fn to_sse(envelope: &EventEnvelope) -> Option<Event> {
    match serde_json::to_string(envelope) {
        Ok(json) => Some(
            Event::default()
                .event(envelope.event_type.clone())
                .id(envelope.event_id.to_string())
                .data(json),
        ),
        Err(e) => {
            tracing::warn!(
                subsystem = "api",
                component = "sse",
                event_type = %envelope.event_type,
                error = %e,
                "Dropping unserializable event"
            );
            None
        }
    }
}

/// Clients connect to `/api/v1/events` and receive every bus event as it is
/// emitted. Lagged receivers skip ahead; payloads carry full state.
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.runtime.events().subscribe();
    tracing::debug!(subsystem = "api", component = "sse", "SSE client connected");

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(envelope) => to_sse(&envelope).map(Ok),
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}
