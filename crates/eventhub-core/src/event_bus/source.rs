//! Event types, keys and sources.
//!
//! An event type is any `Clone + Send + Sync + 'static` Rust type; its
//! [`EventKey`] is derived from the type itself. Producers contribute
//! [`EventSource`]s, cold stream factories that the bus opens whenever the
//! merged output for their type connects.

use futures::stream::{self, BoxStream, StreamExt};
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Marker trait for values that can travel through the bus
pub trait BusEvent: Clone + Send + Sync + 'static {}

impl<T> BusEvent for T where T: Clone + Send + Sync + 'static {}

/// Identifies an event type in the registry
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    id: TypeId,
    name: &'static str,
}

impl EventKey {
    /// Key of the event type `E`
    pub fn of<E: BusEvent>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    /// Fully qualified type name of the event type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKey {}

impl Hash for EventKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a registered source; shared by all clones of an [`EventSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(Uuid);

impl SourceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Src({})", &self.0.to_string()[..8])
    }
}

type StreamFactory<E> = dyn Fn() -> BoxStream<'static, E> + Send + Sync;

/// A producer of events of type `E`
///
/// The factory is called each time the merged output connects, so a source
/// stays lazy: nothing runs until somebody subscribes. Cloning keeps the
/// same [`SourceId`], which is what duplicate detection compares.
pub struct EventSource<E: BusEvent> {
    id: SourceId,
    factory: Arc<StreamFactory<E>>,
}

impl<E: BusEvent> EventSource<E> {
    /// Source backed by a stream factory
    pub fn new<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: futures::Stream<Item = E> + Send + 'static,
    {
        Self {
            id: SourceId::new(),
            factory: Arc::new(move || factory().boxed()),
        }
    }

    /// Source that emits the given items in order and then completes
    pub fn from_values<I>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
    {
        let items: Arc<[E]> = items.into_iter().collect();
        Self::new(move || stream::iter(items.to_vec()))
    }

    /// Source fed by a hot broadcast producer
    ///
    /// Values sent while the merged output is disconnected are not seen.
    pub fn from_sender(sender: &broadcast::Sender<E>) -> Self {
        let sender = sender.clone();
        Self::new(move || receiver_stream(sender.subscribe(), type_name::<E>()))
    }

    /// Identity of this source
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub(crate) fn open(&self) -> BoxStream<'static, E> {
        (self.factory)()
    }
}

impl<E: BusEvent> Clone for EventSource<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<E: BusEvent> fmt::Debug for EventSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("id", &self.id)
            .field("event_type", &type_name::<E>())
            .finish()
    }
}

/// Adapts a broadcast receiver into a stream that skips lagged values
/// and ends when the channel closes.
pub(crate) fn receiver_stream<E: BusEvent>(
    rx: broadcast::Receiver<E>,
    event_type: &'static str,
) -> BoxStream<'static, E> {
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(event_type, skipped, "Receiver lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct CartChanged(u32);

    #[derive(Debug, Clone)]
    struct UserLoggedIn;

    #[test]
    fn test_event_key_identity() {
        assert_eq!(EventKey::of::<CartChanged>(), EventKey::of::<CartChanged>());
        assert_ne!(EventKey::of::<CartChanged>(), EventKey::of::<UserLoggedIn>());
        assert!(EventKey::of::<CartChanged>().name().ends_with("CartChanged"));
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = EventSource::from_values([CartChanged(1)]);
        let b = a.clone();
        let c = EventSource::from_values([CartChanged(1)]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[tokio::test]
    async fn test_from_values_reopens_from_start() {
        let source = EventSource::from_values([CartChanged(1), CartChanged(2)]);
        let first: Vec<_> = source.open().collect().await;
        let second: Vec<_> = source.open().collect().await;
        assert_eq!(first, vec![CartChanged(1), CartChanged(2)]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_from_sender_sees_values_after_open() {
        let (tx, _) = broadcast::channel(8);
        let source = EventSource::from_sender(&tx);

        tx.send(CartChanged(0)).ok();
        let mut opened = source.open();
        tx.send(CartChanged(1)).unwrap();
        drop(tx);
        drop(source);

        assert_eq!(opened.next().await, Some(CartChanged(1)));
        assert_eq!(opened.next().await, None);
    }

    #[tokio::test]
    async fn test_receiver_stream_skips_lag() {
        let (tx, rx) = broadcast::channel(2);
        let mut stream = receiver_stream(rx, "CartChanged");
        for i in 0..5 {
            tx.send(CartChanged(i)).unwrap();
        }
        drop(tx);

        let rest: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(rest, vec![CartChanged(3), CartChanged(4)]);
    }
}
