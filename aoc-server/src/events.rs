//! The event-stream subscribe endpoint (spec §6.3): delivers `BusEvent`
//! JSON envelopes in publish order for a given `audit_id`, as server-sent
//! events. Grounded in the agency's websocket-subscription shape
//! (`orchestration/tracking/websocket.rs`: one subscription per connection,
//! fed from a channel), generalized to the bus's own bounded per-subscriber
//! channel instead of a bespoke connection table.

use crate::state::ServerState;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Comma-separated topic allowlist (spec §6.3 topic catalog); absent
    /// means all topics for this `audit_id`.
    pub topics: Option<String>,
    /// Replay the retained log before switching to live events.
    #[serde(default)]
    pub replay: bool,
}

pub async fn subscribe(
    State(state): State<ServerState>,
    Path(audit_id): Path<String>,
    Query(query): Query<SubscribeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let topics: Option<Vec<&'static str>> = query.topics.as_deref().map(|csv| {
        csv.split(',')
            .filter_map(|t| TOPICS.iter().find(|known| **known == t.trim()).copied())
            .collect()
    });

    let bus = state.coordinator.bus();
    let backlog = if query.replay {
        bus.replay(&audit_id, topics.as_deref())
    } else {
        Vec::new()
    };
    let subscription = bus.subscribe(Some(audit_id), topics);

    let live = ReceiverStream::new(subscription.receiver).map(|event| {
        Ok(Event::default()
            .event(event.topic())
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("serialization error")))
    });

    let backlog_stream = tokio_stream::iter(backlog.into_iter().map(|event| {
        Ok(Event::default()
            .event(event.topic())
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("serialization error")))
    }));

    Sse::new(backlog_stream.chain(live)).keep_alive(KeepAlive::default())
}

/// Topic catalog from spec §6.3, used to validate the `topics` query
/// parameter against known values.
const TOPICS: &[&str] = &[
    "plan.created",
    "tool.started",
    "tool.finished",
    "tool.failed",
    "tool.timeout",
    "finding.correlated",
    "audit.progress",
    "audit.completed",
    "audit.cancelled",
    "audit.failed",
];
