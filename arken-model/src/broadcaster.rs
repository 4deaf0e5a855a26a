use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::event::ModelEvent;

const SUBSCRIBER_CAPACITY: usize = 64;

/// Fans out every `write` to each subscriber queue. Delivery is blocking by
/// default for correctness of ordered delivery; a subscriber whose channel
/// has been closed (the receiver dropped) is pruned on the next write.
pub struct Broadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<ModelEvent>>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Creates a fresh subscriber queue.
    pub fn listen(&self) -> mpsc::Receiver<ModelEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().expect("broadcaster poisoned").push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, dropping any whose
    /// receiver has gone away.
    pub async fn write(&self, event: ModelEvent) {
        let senders: Vec<mpsc::Sender<ModelEvent>> = {
            let guard = self.subscribers.lock().expect("broadcaster poisoned");
            guard.clone()
        };

        let mut dead = Vec::new();
        for (idx, sender) in senders.iter().enumerate() {
            if sender.send(event.clone()).await.is_err() {
                dead.push(idx);
            }
        }

        if !dead.is_empty() {
            let mut guard = self.subscribers.lock().expect("broadcaster poisoned");
            for idx in dead.into_iter().rev() {
                if idx < guard.len() {
                    guard.remove(idx);
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("broadcaster poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, ModelPayload};
    use arken_core::Domain;

    fn event() -> ModelEvent {
        ModelEvent::new(
            EventKind::Create,
            ModelPayload::Domain(Domain::for_service("d.example", "svc")),
        )
    }

    #[tokio::test]
    async fn listeners_receive_writes() {
        let b = Broadcaster::new();
        let mut rx1 = b.listen();
        let mut rx2 = b.listen();

        b.write(event()).await;

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn dead_subscribers_are_dropped() {
        let b = Broadcaster::new();
        let rx = b.listen();
        drop(rx);
        assert_eq!(b.subscriber_count(), 1);

        b.write(event()).await;
        assert_eq!(b.subscriber_count(), 0);
    }
}
