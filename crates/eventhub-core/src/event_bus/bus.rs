//! Event Bus implementation.
//!
//! Provides the core EventBus registry and the global instance for
//! application-wide event distribution.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use super::meta::{Detach, EventMeta};
use super::source::{BusEvent, EventKey, EventSource, SourceId};
use super::stream::EventStream;
use crate::config::EventBusConfig;

type ErasedMeta = Box<dyn Any + Send + Sync>;

/// Handle returned by [`EventBus::register`]
///
/// Call [`revoke`](Self::revoke) when the source is no longer maintained by
/// its owner; the bus keeps registered sources until then.
#[derive(Clone)]
pub struct Registration {
    key: EventKey,
    source: SourceId,
    duplicate: bool,
    target: Weak<dyn Detach>,
}

impl Registration {
    /// Remove the source from its event type
    ///
    /// Returns `true` if the source was active. Revoking again does nothing
    /// and returns `false`.
    ///
    /// After [`EventBus::reset`] the registration still points at the entry
    /// it was made on, not at the bus: while an [`EventStream`] or receiver
    /// from before the reset keeps that entry alive, revoking detaches the
    /// source from it and returns `true`. Otherwise it returns `false`.
    /// Either way the bus itself is untouched.
    pub fn revoke(&self) -> bool {
        match self.target.upgrade() {
            Some(target) => target.detach(self.source),
            None => false,
        }
    }

    /// Event type the source was registered for
    pub fn event_type(&self) -> EventKey {
        self.key
    }

    /// Identity of the registered source
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Whether the source was already active when registered
    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("event_type", &self.key)
            .field("source", &self.source)
            .field("duplicate", &self.duplicate)
            .finish()
    }
}

/// Registry of event sources, keyed by event type
///
/// Producers [`register`](Self::register) streams, consumers
/// [`get`](Self::get) the merged output, and one-off events go through
/// [`dispatch`](Self::dispatch). Entries are created on first use of a type.
pub struct EventBus {
    metas: RwLock<HashMap<EventKey, ErasedMeta>>,
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            metas: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register an event source for its event type
    ///
    /// Registering a source that is already active is a no-op; the returned
    /// registration then reports [`is_duplicate`](Registration::is_duplicate)
    /// and revoking it removes the existing registration.
    pub fn register<E: BusEvent>(&self, source: EventSource<E>) -> Registration {
        let meta = self.meta::<E>();
        let id = source.id();
        let duplicate = !meta.register(source);
        let target: Weak<dyn Detach> = Arc::downgrade(&meta) as Weak<dyn Detach>;

        Registration {
            key: EventKey::of::<E>(),
            source: id,
            duplicate,
            target,
        }
    }

    /// Returns the merged output for the event type `E`
    pub fn get<E: BusEvent>(&self) -> EventStream<E> {
        EventStream::new(self.meta::<E>())
    }

    /// Dispatch a single event
    ///
    /// Prefer [`register`](Self::register) when the event comes from some
    /// stream: a registered source stays lazy and does no work unless the
    /// output has a subscriber. Returns the number of linked outputs that
    /// accepted the value; nothing is kept for later subscribers.
    pub fn dispatch<E: BusEvent>(&self, event: E) -> usize {
        self.meta::<E>().dispatch(event)
    }

    /// Number of sources registered for `E`, including the dispatch input
    pub fn source_count<E: BusEvent>(&self) -> usize {
        self.existing::<E>().map_or(0, |meta| meta.source_count())
    }

    /// Number of live receivers on the output of `E`
    pub fn subscriber_count<E: BusEvent>(&self) -> usize {
        self.existing::<E>().map_or(0, |meta| meta.subscriber_count())
    }

    /// Event types known to the bus, sorted by name
    pub fn event_types(&self) -> Vec<EventKey> {
        let mut keys: Vec<EventKey> = self.metas.read().keys().copied().collect();
        keys.sort_unstable_by_key(|key| key.name());
        keys
    }

    /// Forget every event type
    ///
    /// Outputs and receivers obtained earlier keep working on their own, but
    /// are no longer reachable through this bus.
    pub fn reset(&self) {
        let dropped = std::mem::take(&mut *self.metas.write());
        tracing::debug!(event_types = dropped.len(), "Event bus reset");
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    fn existing<E: BusEvent>(&self) -> Option<Arc<EventMeta<E>>> {
        self.metas
            .read()
            .get(&EventKey::of::<E>())
            .and_then(|meta| meta.downcast_ref::<Arc<EventMeta<E>>>())
            .cloned()
    }

    fn meta<E: BusEvent>(&self) -> Arc<EventMeta<E>> {
        if let Some(meta) = self.existing::<E>() {
            return meta;
        }

        let key = EventKey::of::<E>();
        let mut metas = self.metas.write();
        let entry = metas.entry(key).or_insert_with(|| {
            tracing::trace!(event_type = key.name(), "Event meta created");
            Box::new(Arc::new(EventMeta::<E>::new(&self.config))) as ErasedMeta
        });

        match entry.downcast_ref::<Arc<EventMeta<E>>>() {
            Some(meta) => Arc::clone(meta),
            None => {
                // Keys are TypeIds, so a mismatch means the map was corrupted.
                tracing::error!(event_type = key.name(), "Event meta type mismatch, replacing");
                let meta = Arc::new(EventMeta::<E>::new(&self.config));
                *entry = Box::new(Arc::clone(&meta)) as ErasedMeta;
                meta
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.metas.read().len())
            .field("config", &self.config)
            .finish()
    }
}

/// Global event bus instance
static EVENT_BUS: OnceLock<EventBus> = OnceLock::new();

/// Get or initialize the global event bus
///
/// This is the primary way to access the event bus throughout the application.
pub fn event_bus() -> &'static EventBus {
    EVENT_BUS.get_or_init(EventBus::new)
}

/// Initialize the global event bus with custom configuration
///
/// Must be called before any calls to `event_bus()`. Returns the rejected
/// configuration if the event bus has already been initialized.
pub fn init_event_bus(config: EventBusConfig) -> Result<(), EventBusConfig> {
    EVENT_BUS
        .set(EventBus::with_config(config))
        .map_err(|bus| bus.config.clone())
}

/// Convenience macro to dispatch an event on the global event bus
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::event_bus::event_bus().dispatch($event)
    };
}

/// Convenience macro to get the merged output of an event type on the global event bus
#[macro_export]
macro_rules! on_event {
    ($event_type:ty) => {
        $crate::event_bus::event_bus().get::<$event_type>()
    };
}
