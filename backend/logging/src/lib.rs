//! Telemetry and structured logging components for plugcache.
//!
//! Handles subscriber setup (console + rolling JSON file) and plugin event logging.

pub mod event_logger;
pub mod logger;

pub use event_logger::{EVENT_TARGET, EventLogEntry, EventLogger, PluginEvent};
pub use logger::{LOG_FILE_PREFIX, init_console_logger, init_logger};
