//! # eventhub
//!
//! A typed, in-process event registry.
//!
//! ## Architecture
//!
//! eventhub is organized as a workspace:
//!
//! 1. **eventhub-core** - event registry and dispatch bus, configuration, errors
//! 2. **eventhub** - logging setup, re-exports and the demo binary
//!
//! ## Features
//!
//! - **Many producers per type**: features register event sources without knowing about each other
//! - **Shared merged output**: consumers of a type share one merge, sources are opened once
//! - **One-off dispatch**: imperative events without a source stream
//! - **Revocable registrations**: producers withdraw their sources explicitly

pub use eventhub_core::{
    config, error, event_bus, init_event_bus, BusEvent, ConfigError, Error, EventBus,
    EventBusConfig, EventKey, EventReceiver, EventSource, EventStream, Registration, Result,
    SourceId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
/// - `verbose` raises the default level from INFO to DEBUG
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
