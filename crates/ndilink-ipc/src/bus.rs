//! In-process publish/subscribe channel.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::trace;

use crate::events::BridgeEvent;

/// Synchronous fan-out of [`BridgeEvent`]s to every live subscription.
///
/// Publishing never blocks: each subscription owns an unbounded queue that
/// its consumer drains on the host tick. Publishers may live on any thread.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<BridgeEvent>>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Dropping the returned handle unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(sender);
        Subscription { receiver }
    }

    /// Deliver `event` to every subscriber, in publish order.
    pub fn publish(&self, event: BridgeEvent) {
        trace!(event = event.name(), "Publishing event");

        // Disconnected senders belong to dropped subscriptions.
        self.subscribers
            .lock()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Number of subscriptions that were alive at the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Receiving end of an [`EventBus`] subscription.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<BridgeEvent>,
}

impl Subscription {
    /// Take the next pending event, if any.
    pub fn try_recv(&self) -> Option<BridgeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BridgeEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Take every pending event.
    pub fn drain(&self) -> Vec<BridgeEvent> {
        self.receiver.try_iter().collect()
    }
}
