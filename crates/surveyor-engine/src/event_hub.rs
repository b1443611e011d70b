//! In-process run event broadcast
//!
//! Subscribers register per run id and receive every event emitted for
//! that run, in emit order. Events are not buffered for late subscribers;
//! the event log repository retains the durable history. Closed receivers
//! are pruned on the next emit for their run, and a run's subscriber set
//! is dropped entirely once it empties.

use dashmap::DashMap;
use surveyor_core::RunEvent;
use tokio::sync::mpsc;

pub struct EventHub {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<RunEvent>>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Subscribe to a run's event stream. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self, run_id: &str) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(run_id.to_string()).or_default().push(tx);
        rx
    }

    /// Deliver an event to every current subscriber for its run id, in
    /// subscription order. No-op when nobody is listening.
    pub fn emit(&self, event: &RunEvent) {
        let run_id = event.run_id().to_string();
        let mut drop_entry = false;
        if let Some(mut entry) = self.subscribers.get_mut(&run_id) {
            entry.retain(|tx| tx.send(event.clone()).is_ok());
            drop_entry = entry.is_empty();
        }
        if drop_entry {
            self.subscribers.remove_if(&run_id, |_, senders| senders.is_empty());
        }
    }

    #[cfg(test)]
    fn subscriber_sets(&self) -> usize {
        self.subscribers.len()
    }
}
