//! `GET /events`: one Server-Sent Events stream per subscriber.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::response::sse::{Event, Sse};
use futures_util::Stream;
use futures_util::stream;
use tracing::debug;

use super::AppState;
use crate::broadcast::Subscription;
use crate::events::Frame;

/// Origin used for subscribers whose peer address is unavailable.
const UNKNOWN_ORIGIN: &str = "unknown";

pub async fn events(
    State(state): State<AppState>,
    request: Request,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let origin = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_ORIGIN.to_string(), |info| info.0.ip().to_string());

    let subscription = state.orchestrator.subscribe(origin);
    debug!(subscriber_id = subscription.id(), "Opening event stream");
    Sse::new(frame_stream(subscription))
}

/// Turn a subscription into an SSE stream. Ends when the broadcaster drops
/// the subscriber; dropping the stream drops the subscription.
fn frame_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(subscription, |mut subscription| async move {
        let frame = subscription.next_frame().await?;
        Some((to_event(&frame), subscription))
    })
}

fn to_event(frame: &Frame) -> Result<Event, axum::Error> {
    let event = Event::default().event(frame.name());
    let event = match frame.seq {
        Some(seq) => event.id(seq.to_string()),
        None => event,
    };
    event.json_data(frame)
}
