use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::broadcaster::Broadcaster;
use crate::event::{EventKind, ModelEvent, ModelKind};

type BufferKey = (ModelKind, EventKind, String);

/// Coalescing queue keyed by `(modelType, eventType, name)`; flushed on a
/// tick, emitting events sorted by time ascending. The internal map is
/// owned exclusively by the `run` loop (single-writer/single-reader): `push`
/// only hands events across an mpsc channel, never touches the map itself.
pub struct EventBuffer {
    incoming: mpsc::Sender<ModelEvent>,
}

impl EventBuffer {
    /// Creates the buffer and returns it alongside the receiver its `run`
    /// loop consumes.
    pub fn new() -> (Self, mpsc::Receiver<ModelEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (Self { incoming: tx }, rx)
    }

    /// Enqueues an event; a later push with the same key overwrites it
    /// before the next flush.
    pub async fn push(&self, event: ModelEvent) {
        let _ = self.incoming.send(event).await;
    }

    /// Drives the tick loop: on every tick of `period`, drains the map,
    /// sorts by time ascending, and forwards to `broadcaster`. Exits when
    /// the incoming channel closes (all `EventBuffer` handles dropped).
    pub async fn run(mut incoming: mpsc::Receiver<ModelEvent>, broadcaster: Arc<Broadcaster>, period: Duration) {
        let mut map: HashMap<BufferKey, ModelEvent> = HashMap::new();
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if map.is_empty() {
                        continue;
                    }
                    let mut drained: Vec<ModelEvent> = map.drain().map(|(_, v)| v).collect();
                    drained.sort_by_key(|e| e.time);
                    for event in drained {
                        broadcaster.write(event).await;
                    }
                }
                maybe_event = incoming.recv() => {
                    match maybe_event {
                        Some(event) => {
                            map.insert(event.key(), event);
                        }
                        None => break,
                    }
                }
            }
        }
    }
}
