//! Server-Sent Events support

use crate::runtime::{Snapshot, SnapshotSource, SseEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    snapshot: Snapshot,
    broadcast_rx: broadcast::Receiver<SseEvent>,
    source: SnapshotSource,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let synced_up_to = last_message_id(&snapshot);
    let init = stream::once(async move { SseEvent::Init { snapshot } });

    let combined = init
        .chain(resync_on_lag(broadcast_rx, source, synced_up_to))
        .map(|event| Ok(sse_event_to_axum(event)));

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Broadcast events for one subscriber
///
/// A subscriber that lags gets a fresh `init` snapshot in place of the events
/// it lost. Messages already covered by the last snapshot sent (ids up to
/// `synced_up_to`) are not repeated.
pub(super) fn resync_on_lag(
    broadcast_rx: broadcast::Receiver<SseEvent>,
    source: SnapshotSource,
    synced_up_to: u64,
) -> impl Stream<Item = SseEvent> {
    let events = BroadcastStream::new(broadcast_rx);
    stream::unfold(
        (events, source, synced_up_to),
        |(mut events, source, mut synced_up_to)| async move {
            loop {
                match events.next().await? {
                    Ok(SseEvent::Message { message }) if message.id.get() <= synced_up_to => {}
                    Ok(event) => return Some((event, (events, source, synced_up_to))),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(conv_id = %source.id(), skipped, "SSE subscriber lagged, resending snapshot");
                        // Conversation gone: end the stream
                        let snapshot = source.snapshot().await.ok()?;
                        synced_up_to = last_message_id(&snapshot);
                        return Some((SseEvent::Init { snapshot }, (events, source, synced_up_to)));
                    }
                }
            }
        },
    )
}

fn last_message_id(snapshot: &Snapshot) -> u64 {
    snapshot.messages.last().map_or(0, |m| m.id.get())
}

/// Event name and JSON payload sent for an event
pub(super) fn event_payload(event: SseEvent) -> (&'static str, Value) {
    match event {
        SseEvent::Init { snapshot } => (
            "init",
            json!({
                "type": "init",
                "conversation": snapshot
            }),
        ),
        SseEvent::Message { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        SseEvent::Composing => ("composing", json!({ "type": "composing" })),
        SseEvent::Reveal { text } => (
            "reveal",
            json!({
                "type": "reveal",
                "text": text
            }),
        ),
        SseEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state
            }),
        ),
        SseEvent::CompletionPending { pending } => (
            "completion_pending",
            json!({
                "type": "completion_pending",
                "pending": pending
            }),
        ),
        SseEvent::Notification(notification) => (
            "notification",
            json!({
                "type": "notification",
                "notification": notification
            }),
        ),
        SseEvent::Speak { text } => (
            "speak",
            json!({
                "type": "speak",
                "text": text
            }),
        ),
        SseEvent::StopSpeaking => ("stop_speaking", json!({ "type": "stop_speaking" })),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}
