//! Server-Sent Events stream for live poll updates.
//!
//! One connection per viewer per poll. The topic subscription is opened
//! *before* the snapshot is computed, so an update racing the snapshot is
//! delivered after it rather than lost. Frame order on a connection matches
//! publish order on the topic.

#![allow(missing_docs)]

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use pollwave_common::AppResult;
use pollwave_realtime::PollSubscription;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::middleware::AppState;

/// Retry interval advertised to clients.
const RETRY: Duration = Duration::from_secs(3);

/// Idle ping interval; defeats intermediary idle-connection timeouts.
const KEEP_ALIVE: Duration = Duration::from_secs(15);

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// `GET /polls/{id}/stream`
///
/// Existence is the only gate; hidden polls still stream (moderation hides
/// them from listings, not from direct subscribers).
pub async fn poll_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Sse<KeepAliveStream<EventStream>>> {
    let poll = state.poll_repo.get_by_id(&id).await?;

    // Subscribe before the snapshot; mandatory ordering.
    let subscription = match state.pubsub.subscribe_poll(&poll.id).await {
        Ok(sub) => sub,
        Err(e) => {
            // Degraded mode: the stream opens anyway and tells the client
            // live updates are unavailable.
            warn!(poll_id = %poll.id, error = %e, "Stream subscribe failed, serving degraded stream");
            return Ok(sse_response(degraded_stream().boxed()));
        }
    };

    let snapshot = state.aggregate_service.load(&poll.id).await?;
    let snapshot_event = Event::default()
        .event("snapshot")
        .json_data(json!({
            "pollId": snapshot.poll_id,
            "totalVotes": snapshot.total_votes,
            "counts": snapshot.counts,
            "percents": snapshot.percents(),
        }))
        .unwrap_or_else(|_| Event::default().event("snapshot").data("{}"));

    let preamble = stream::iter([retry_event(), snapshot_event]).map(Ok);
    let updates = forwarded_events(subscription);

    Ok(sse_response(preamble.chain(updates).boxed()))
}

fn sse_response(stream: EventStream) -> Sse<KeepAliveStream<EventStream>> {
    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

fn retry_event() -> Event {
    Event::default().retry(RETRY)
}

/// Forward broadcast messages as named SSE events until the topic closes
/// or the client disconnects (which drops the subscription).
fn forwarded_events(
    subscription: PollSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut sub| async move {
        loop {
            match sub.recv().await {
                Ok(msg) => {
                    let event = Event::default().event(msg.event).data(msg.data.to_string());
                    return Some((Ok(event), sub));
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Slow consumer; at-least-once is the contract and the
                    // next update carries the full aggregate anyway.
                    debug!(skipped, "SSE consumer lagged behind poll topic");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

/// Stream served when the broadcast transport is down at subscribe time:
/// retry advice, one `error` event, then keep-alives only.
fn degraded_stream() -> impl Stream<Item = Result<Event, Infallible>> {
    let error_event = Event::default()
        .event("error")
        .json_data(json!({"code": "stream_unavailable"}))
        .unwrap_or_else(|_| Event::default().event("error").data("{}"));

    stream::iter([retry_event(), error_event])
        .map(Ok)
        .chain(stream::pending())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_degraded_stream_frames() {
        let frames: Vec<_> = degraded_stream().take(2).collect().await;
        assert_eq!(frames.len(), 2);
        // The third frame never arrives; keep-alive comments are appended by
        // the Sse layer, not the stream.
        let mut rest = degraded_stream().skip(2);
        tokio::select! {
            _ = rest.next() => panic!("degraded stream must stay pending"),
            () = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
    }
}
