//! Event Bus
//!
//! Fans plugin cache events out to subscribers and to the structured event log.

use plugcache_logging::{EventLogger, PluginEvent};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<PluginEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender: tx }
    }

    /// Log the event and deliver it to current subscribers. Having no
    /// subscribers is not an error.
    pub fn publish(&self, event: PluginEvent) {
        let entry = EventLogger::log_event(event);
        let _ = self.sender.send(entry.event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
