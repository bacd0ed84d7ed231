//! Plugin Event Logger
//!
//! Structured plugin cache events written through
//! `tracing` under the `plugin_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Tracing target every plugin event is emitted under.
pub const EVENT_TARGET: &str = "plugin_events";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginEvent {
    Loaded {
        name: String,
        type_name: String,
        origin: String,
        generation: u64,
        expires_at: Option<DateTime<Utc>>,
    },
    CacheHit {
        name: String,
        generation: u64,
    },
    LoadFailed {
        name: String,
        origin: String,
        error: String,
    },
    Evicted {
        name: String,
        cause: String,
    },
    Removed {
        name: String,
    },
    Cleaned {
        count: usize,
    },
}

impl PluginEvent {
    /// Plugin name the event concerns, if it concerns a single plugin.
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Self::Loaded { name, .. }
            | Self::CacheHit { name, .. }
            | Self::LoadFailed { name, .. }
            | Self::Evicted { name, .. }
            | Self::Removed { name } => Some(name),
            Self::Cleaned { .. } => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: PluginEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Stamp and emit a plugin event.
    pub fn log_event(event: PluginEvent) -> EventLogEntry {
        let entry = EventLogEntry {
            timestamp: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry).unwrap_or_default();

        match &entry.event {
            PluginEvent::LoadFailed { .. } => {
                warn!(target: EVENT_TARGET, event = %json, "Plugin event")
            }
            PluginEvent::CacheHit { .. } => {
                debug!(target: EVENT_TARGET, event = %json, "Plugin event")
            }
            _ => info!(target: EVENT_TARGET, event = %json, "Plugin event"),
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let entry = EventLogger::log_event(PluginEvent::Removed {
            name: "DemoPlugin001".into(),
        });
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["event"]["type"], "removed");
        assert_eq!(value["event"]["name"], "DemoPlugin001");
    }

    #[test]
    fn cleaned_has_no_plugin_name() {
        assert_eq!(PluginEvent::Cleaned { count: 3 }.plugin_name(), None);
        let evicted = PluginEvent::Evicted {
            name: "demo".into(),
            cause: "expired".into(),
        };
        assert_eq!(evicted.plugin_name(), Some("demo"));
    }
}
