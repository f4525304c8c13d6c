//! # eventhub core
//!
//! Event registry and dispatch bus: many producers contribute streams of an
//! event type, many consumers share one merged output per type, and one-off
//! events can be dispatched directly.

pub mod config;
pub mod error;
pub mod event_bus;

pub use config::EventBusConfig;
pub use error::{ConfigError, Error, Result};

// Re-export event bus for convenience
pub use event_bus::{
    event_bus, init_event_bus, BusEvent, EventBus, EventKey, EventReceiver, EventSource,
    EventStream, Registration, SourceId,
};
