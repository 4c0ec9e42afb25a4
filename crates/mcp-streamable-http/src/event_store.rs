//! The SSE event store (§4.4): durable, replayable storage for a
//! `(sessionId, streamId)`'s outbound event sequence, keyed so a client's
//! `Last-Event-Id` can resume delivery after a dropped connection.
//!
//! A writer assigns the next sequence number atomically with its metadata
//! update; a reader resolves a `Last-Event-Id` back to `(sessionId,
//! streamId, sequence)` and replays everything after it, or reports the id
//! unresolvable so the caller can fail the resume and have the client
//! restart.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use dashmap::DashMap;

use crate::error::{StreamableError, StreamableResult};

/// Encoding version for event ids issued by this store. Bumping this when
/// the encoding changes lets stale ids fail resumption cleanly instead of
/// resolving to the wrong stream.
const EVENT_ID_FORMAT_VERSION: &str = "v1";

/// One event persisted by the store, as handed to a writer.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// The SSE event type (`"message"` for JSON-RPC traffic, `"endpoint"`
    /// for the session's initial discovery event).
    pub event_type: String,
    /// The serialized JSON-RPC payload.
    pub data: String,
}

impl StoredEvent {
    /// Build a `"message"` event carrying a serialized JSON-RPC payload.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self { event_type: "message".to_string(), data: data.into() }
    }
}

/// A [`StoredEvent`] plus the id the store assigned it on write.
#[derive(Debug, Clone)]
pub struct DeliveredEvent {
    /// The id a client presents as `Last-Event-Id` to resume after this
    /// event.
    pub id: String,
    /// The event itself.
    pub event: StoredEvent,
}

struct StreamRecord {
    events: VecDeque<(u64, StoredEvent)>,
    last_sequence: u64,
    is_completed: bool,
    touched_at: Instant,
}

impl StreamRecord {
    fn new() -> Self {
        Self {
            events: VecDeque::new(),
            last_sequence: 0,
            is_completed: false,
            touched_at: Instant::now(),
        }
    }
}

/// A store for one deployment's outbound SSE events, addressable by
/// `(sessionId, streamId)` and recoverable from any event id it issued.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist `event` as the next entry in `(session_id, stream_id)`,
    /// returning the id a client can later present as `Last-Event-Id`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamableError::StreamDisposed`] if the stream was already
    /// marked complete.
    async fn write(
        &self,
        session_id: &str,
        stream_id: &str,
        event: StoredEvent,
    ) -> StreamableResult<String>;

    /// Mark `(session_id, stream_id)` complete. Further writes to it fail.
    async fn dispose(&self, session_id: &str, stream_id: &str);

    /// Resolve `last_event_id` and return every event after it, or `None` if
    /// the id's stream metadata has expired or never existed — the caller
    /// must then fail the resume and have the client restart (§4.4).
    async fn read_from(&self, last_event_id: &str) -> StreamableResult<Option<Vec<DeliveredEvent>>>;
}

fn encode_event_id(session_id: &str, stream_id: &str, sequence: u64) -> String {
    format!(
        "{EVENT_ID_FORMAT_VERSION}:{}:{}:{sequence}",
        URL_SAFE_NO_PAD.encode(session_id),
        URL_SAFE_NO_PAD.encode(stream_id),
    )
}

fn decode_event_id(id: &str) -> Option<(String, String, u64)> {
    let mut parts = id.splitn(4, ':');
    if parts.next()? != EVENT_ID_FORMAT_VERSION {
        return None;
    }
    let session_id = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
    let stream_id = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
    let sequence: u64 = parts.next()?.parse().ok()?;
    Some((String::from_utf8(session_id).ok()?, String::from_utf8(stream_id).ok()?, sequence))
}

/// An in-process [`EventStore`] backed by a bounded per-stream ring buffer
/// with a sliding expiration. Suitable for a single server instance; a
/// multi-instance deployment needs a shared backing store instead (e.g.
/// Redis), which can implement the same trait.
pub struct InMemoryEventStore {
    streams: DashMap<(String, String), StreamRecord>,
    max_events_per_stream: usize,
    ttl: Duration,
}

impl InMemoryEventStore {
    /// Build a store keeping up to `max_events_per_stream` events per
    /// `(sessionId, streamId)`, each stream expiring `ttl` after its last
    /// write or read if untouched.
    #[must_use]
    pub fn new(max_events_per_stream: usize, ttl: Duration) -> Self {
        Self { streams: DashMap::new(), max_events_per_stream, ttl }
    }

    fn sweep_expired(&self) {
        let ttl = self.ttl;
        self.streams.retain(|_, record| record.touched_at.elapsed() < ttl);
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(2 * 60 * 60))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn write(
        &self,
        session_id: &str,
        stream_id: &str,
        event: StoredEvent,
    ) -> StreamableResult<String> {
        self.sweep_expired();
        let key = (session_id.to_string(), stream_id.to_string());
        let mut record = self.streams.entry(key).or_insert_with(StreamRecord::new);
        if record.is_completed {
            return Err(StreamableError::StreamDisposed(stream_id.to_string()));
        }
        record.last_sequence += 1;
        let sequence = record.last_sequence;
        record.events.push_back((sequence, event));
        if record.events.len() > self.max_events_per_stream {
            record.events.pop_front();
        }
        record.touched_at = Instant::now();
        Ok(encode_event_id(session_id, stream_id, sequence))
    }

    async fn dispose(&self, session_id: &str, stream_id: &str) {
        if let Some(mut record) = self.streams.get_mut(&(session_id.to_string(), stream_id.to_string())) {
            record.is_completed = true;
        }
    }

    async fn read_from(&self, last_event_id: &str) -> StreamableResult<Option<Vec<DeliveredEvent>>> {
        self.sweep_expired();
        let Some((session_id, stream_id, sequence)) = decode_event_id(last_event_id) else {
            return Ok(None);
        };
        let Some(record) = self.streams.get(&(session_id.clone(), stream_id.clone())) else {
            return Ok(None);
        };
        let events = record
            .events
            .iter()
            .filter(|(seq, _)| *seq > sequence)
            .map(|(seq, event)| DeliveredEvent {
                id: encode_event_id(&session_id, &stream_id, *seq),
                event: event.clone(),
            })
            .collect();
        Ok(Some(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_from_resumes_after_the_written_event() {
        let store = InMemoryEventStore::default();
        let id1 = store.write("sess-1", "main", StoredEvent::message("one")).await.unwrap();
        store.write("sess-1", "main", StoredEvent::message("two")).await.unwrap();
        let replay = store.read_from(&id1).await.unwrap().unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].event.data, "two");
    }

    #[tokio::test]
    async fn read_from_an_unknown_id_returns_none() {
        let store = InMemoryEventStore::default();
        assert!(store.read_from("v1:bm9wZQ:bm9wZQ:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_from_a_malformed_id_returns_none() {
        let store = InMemoryEventStore::default();
        assert!(store.read_from("not-an-event-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_after_dispose_fails() {
        let store = InMemoryEventStore::default();
        store.write("sess-1", "main", StoredEvent::message("one")).await.unwrap();
        store.dispose("sess-1", "main").await;
        assert!(store.write("sess-1", "main", StoredEvent::message("two")).await.is_err());
    }

    #[tokio::test]
    async fn ring_buffer_drops_oldest_beyond_capacity() {
        let store = InMemoryEventStore::new(2, Duration::from_secs(60));
        store.write("sess-1", "main", StoredEvent::message("one")).await.unwrap();
        let id2 = store.write("sess-1", "main", StoredEvent::message("two")).await.unwrap();
        store.write("sess-1", "main", StoredEvent::message("three")).await.unwrap();
        let replay = store.read_from(&id2).await.unwrap().unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].event.data, "three");
    }

    #[tokio::test]
    async fn distinct_streams_on_the_same_session_do_not_collide() {
        let store = InMemoryEventStore::default();
        let id = store.write("sess-1", "unsolicited", StoredEvent::message("a")).await.unwrap();
        store.write("sess-1", "request-7", StoredEvent::message("b")).await.unwrap();
        let replay = store.read_from(&id).await.unwrap().unwrap();
        assert!(replay.is_empty(), "the other stream's event must not leak into this replay");
    }
}
