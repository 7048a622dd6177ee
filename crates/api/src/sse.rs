//! Server-Sent Events for the authenticated user's channel.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use livenest_core::user_channel;
use livenest_realtime::RealtimeEvent;
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::{extractors::AuthUser, middleware::AppState};

/// Render a realtime event as an SSE frame named after the event.
fn to_sse_event(event: &RealtimeEvent) -> Event {
    Event::default()
        .event(event.event.as_str())
        .json_data(&event.payload)
        .unwrap_or_else(|_| Event::default().event("error").data("error"))
}

/// Stream of everything published to `user:{id}`.
async fn user_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let channel = user_channel(&user.id);
    let rx = state.broadcaster.subscribe(&channel).await;
    tracing::debug!(channel = %channel, "SSE client connected");

    // Lagged receivers skip the missed events.
    let events = BroadcastStream::new(rx)
        .filter_map(|result| result.ok().map(|event| Ok(to_sse_event(&event))));

    let initial = stream::once(async move {
        Ok(Event::default()
            .event("connected")
            .json_data(json!({ "channel": channel }))
            .unwrap_or_else(|_| Event::default().data("connected")))
    });

    Sse::new(initial.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(user_stream))
}
