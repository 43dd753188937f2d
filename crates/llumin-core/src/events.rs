// Bridge event bus
//
// A narrow publish/subscribe surface decoupling channel-internal
// notification from application logic. One event kind for now; the
// typed enum keeps consumers off string matching.

use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications the bridge raises toward the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The remote system reloaded its tag list; the host should refetch
    /// (the bridge does not refetch on its own).
    TagListChanged,
}

/// Broadcast-backed event bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Best-effort publish; no subscribers is fine.
    pub fn emit(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(BridgeEvent::TagListChanged);
        assert_eq!(rx.recv().await.unwrap(), BridgeEvent::TagListChanged);
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(BridgeEvent::TagListChanged);
    }
}
