//! # Event Bus Module
//!
//! Provides a typed event registry for decoupled communication between
//! application features.
//!
//! ## Overview
//!
//! - Producers register [`EventSource`]s for an event type without knowing
//!   about each other
//! - Consumers get one merged [`EventStream`] per event type without knowing
//!   how many producers exist
//! - One-off events are dispatched without registering a stream
//!
//! The merged output is shared: sources are opened once when the first
//! receiver subscribes, whatever the number of receivers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eventhub_core::event_bus::{event_bus, EventSource};
//!
//! #[derive(Debug, Clone)]
//! struct CartChanged { entries: u32 }
//!
//! # async fn demo() -> eventhub_core::Result<()> {
//! // Consume the merged output
//! let mut carts = event_bus().get::<CartChanged>().subscribe()?;
//!
//! // Contribute a source, keep the registration to revoke it later
//! let registration = event_bus().register(EventSource::from_values([
//!     CartChanged { entries: 1 },
//!     CartChanged { entries: 2 },
//! ]));
//!
//! // Dispatch a one-off event
//! event_bus().dispatch(CartChanged { entries: 0 });
//!
//! while let Some(cart) = carts.recv().await {
//!     println!("cart has {} entries", cart.entries);
//! }
//!
//! registration.revoke();
//! # Ok(())
//! # }
//! ```

mod bus;
mod meta;
mod source;
mod stream;

pub use bus::*;
pub use source::{BusEvent, EventKey, EventSource, SourceId};
pub use stream::{EventReceiver, EventStream};
