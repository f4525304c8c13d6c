//! Per event type state: registered sources, dispatch input and the shared
//! merged output.
//!
//! The output is a broadcast channel with a stable identity. While at least
//! one receiver exists, a *link* feeds it: one driver task polls the merge of
//! every registered source. Sources added or revoked while linked are
//! attached to or aborted in the running merge; the other sources are left
//! untouched.
//!
//! The dispatch input is an ordinary source whose factory opens a fresh
//! unbounded channel per link, so dispatched values are never dropped between
//! `dispatch` and the driver.

use futures::stream::{self, AbortHandle, Abortable, BoxStream, SelectAll, StreamExt};
use parking_lot::Mutex;
use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::source::{BusEvent, EventSource, SourceId};
use crate::config::EventBusConfig;
use crate::error::{Error, Result};

type LinkedStream<E> = Abortable<BoxStream<'static, E>>;

/// Sender into the dispatch input of the current link, if any
type InputSlot<E> = Arc<Mutex<Option<mpsc::UnboundedSender<E>>>>;

fn dispatch_source<E: BusEvent>(slot: &InputSlot<E>) -> EventSource<E> {
    let slot = Arc::clone(slot);
    EventSource::new(move || {
        let (tx, rx) = mpsc::unbounded_channel();
        *slot.lock() = Some(tx);
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    })
}

/// Running merge feeding the output channel
struct Link<E: BusEvent> {
    attach: mpsc::UnboundedSender<LinkedStream<E>>,
    aborts: HashMap<SourceId, AbortHandle>,
    driver: JoinHandle<()>,
}

impl<E: BusEvent> Link<E> {
    fn open(&mut self, source: &EventSource<E>) {
        let (stream, handle) = stream::abortable(source.open());
        self.aborts.insert(source.id(), handle);
        // Only fails once the driver has stopped, and then the link is being torn down.
        let _ = self.attach.send(stream);
    }
}

struct MetaState<E: BusEvent> {
    sources: Vec<EventSource<E>>,
    input: Option<InputSlot<E>>,
    subscribers: usize,
    link: Option<Link<E>>,
}

impl<E: BusEvent> MetaState<E> {
    /// Appends the source; returns `false` if its id is already present.
    fn attach(&mut self, source: EventSource<E>) -> bool {
        if self.sources.iter().any(|s| s.id() == source.id()) {
            return false;
        }
        if let Some(link) = self.link.as_mut() {
            link.open(&source);
        }
        self.sources.push(source);
        true
    }
}

pub(crate) struct EventMeta<E: BusEvent> {
    output: broadcast::Sender<E>,
    dev_mode: bool,
    state: Mutex<MetaState<E>>,
}

impl<E: BusEvent> EventMeta<E> {
    pub(crate) fn new(config: &EventBusConfig) -> Self {
        let (output, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            output,
            dev_mode: config.dev_mode,
            state: Mutex::new(MetaState {
                sources: Vec::new(),
                input: None,
                subscribers: 0,
                link: None,
            }),
        }
    }

    pub(crate) fn event_type(&self) -> &'static str {
        type_name::<E>()
    }

    /// Adds a source; returns `false` for a duplicate.
    pub(crate) fn register(&self, source: EventSource<E>) -> bool {
        let id = source.id();
        let added = self.state.lock().attach(source);
        if added {
            tracing::trace!(event_type = self.event_type(), source = %id, "Source registered");
        } else if self.dev_mode {
            tracing::warn!(
                event_type = self.event_type(),
                source = %id,
                "Event source has already been registered for this type"
            );
        }
        added
    }

    /// Removes a source; returns `false` if it was not registered.
    pub(crate) fn unregister(&self, id: SourceId) -> bool {
        let mut state = self.state.lock();
        let before = state.sources.len();
        state.sources.retain(|s| s.id() != id);
        let removed = state.sources.len() != before;

        if let Some(handle) = state.link.as_mut().and_then(|link| link.aborts.remove(&id)) {
            handle.abort();
        }
        drop(state);

        if removed {
            tracing::trace!(event_type = self.event_type(), source = %id, "Source revoked");
        }
        removed
    }

    /// Sends a value through the dispatch input, creating it on first use.
    ///
    /// Returns the number of links that accepted the value: 1 while the
    /// output has a receiver, otherwise 0 and the value is dropped.
    pub(crate) fn dispatch(&self, event: E) -> usize {
        let mut state = self.state.lock();
        let input = match state.input.clone() {
            Some(input) => input,
            None => {
                let input: InputSlot<E> = Arc::new(Mutex::new(None));
                state.attach(dispatch_source(&input));
                state.input = Some(Arc::clone(&input));
                tracing::debug!(event_type = self.event_type(), "Dispatch input created");
                input
            }
        };

        // Sent under the state lock so a concurrent release cannot strand the value.
        let sent = input
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok());
        drop(state);

        if sent {
            1
        } else {
            if self.dev_mode {
                tracing::debug!(
                    event_type = self.event_type(),
                    "Event dispatched with no subscriber, dropped"
                );
            }
            0
        }
    }

    pub(crate) fn source_count(&self) -> usize {
        self.state.lock().sources.len()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.state.lock().link.is_some()
    }

    /// Registers a new receiver on the output, linking the sources if this is
    /// the first one.
    pub(crate) fn subscribe(&self) -> Result<broadcast::Receiver<E>> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime {
            event_type: self.event_type(),
        })?;

        let mut state = self.state.lock();
        let rx = self.output.subscribe();
        state.subscribers += 1;
        if state.link.is_none() {
            let link = self.link(&state.sources, &runtime);
            state.link = Some(link);
            tracing::debug!(
                event_type = self.event_type(),
                sources = state.sources.len(),
                "Output linked"
            );
        }
        Ok(rx)
    }

    /// Drops one receiver's claim; the last one tears the link down.
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 {
            if let Some(link) = state.link.take() {
                link.driver.abort();
                if let Some(input) = &state.input {
                    *input.lock() = None;
                }
                tracing::debug!(event_type = self.event_type(), "Output unlinked");
            }
        }
    }

    fn link(&self, sources: &[EventSource<E>], runtime: &Handle) -> Link<E> {
        let (attach, mut attached) = mpsc::unbounded_channel::<LinkedStream<E>>();
        let mut merged: SelectAll<LinkedStream<E>> = SelectAll::new();
        let mut aborts = HashMap::with_capacity(sources.len());

        // Sources are opened here, not in the driver, so nothing sent between
        // subscribe() and the driver's first poll is lost.
        for source in sources {
            let (stream, handle) = stream::abortable(source.open());
            aborts.insert(source.id(), handle);
            merged.push(stream);
        }

        let output = self.output.clone();
        let driver = runtime.spawn(async move {
            loop {
                tokio::select! {
                    next = attached.recv() => match next {
                        Some(stream) => merged.push(stream),
                        None => break,
                    },
                    Some(event) = merged.next(), if !merged.is_empty() => {
                        let _ = output.send(event);
                    }
                }
            }
        });

        Link {
            attach,
            aborts,
            driver,
        }
    }
}

/// Type-erased revocation target held by a registration
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: SourceId) -> bool;
}

impl<E: BusEvent> Detach for EventMeta<E> {
    fn detach(&self, id: SourceId) -> bool {
        self.unregister(id)
    }
}

impl<E: BusEvent> Drop for EventMeta<E> {
    fn drop(&mut self) {
        if let Some(link) = self.state.get_mut().link.take() {
            link.driver.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    fn meta() -> EventMeta<Ping> {
        EventMeta::new(&EventBusConfig::default().with_dev_mode(true))
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let meta = meta();
        let source = EventSource::from_values([Ping(1)]);
        assert!(meta.register(source.clone()));
        assert!(!meta.register(source.clone()));
        assert_eq!(meta.source_count(), 1);

        assert!(meta.unregister(source.id()));
        assert!(!meta.unregister(source.id()));
        assert_eq!(meta.source_count(), 0);
    }

    #[test]
    fn test_dispatch_input_registered_once() {
        let meta = meta();
        assert_eq!(meta.dispatch(Ping(1)), 0);
        assert_eq!(meta.dispatch(Ping(2)), 0);
        assert_eq!(meta.source_count(), 1);
    }

    #[test]
    fn test_subscribe_requires_runtime() {
        let meta = meta();
        let err = meta.subscribe().unwrap_err();
        assert!(err.is_no_runtime());
        assert_eq!(meta.subscriber_count(), 0);
        assert!(!meta.is_linked());
    }

    #[tokio::test]
    async fn test_link_follows_subscriber_count() {
        let meta = meta();
        let _a = meta.subscribe().unwrap();
        let _b = meta.subscribe().unwrap();
        assert!(meta.is_linked());
        assert_eq!(meta.subscriber_count(), 2);

        meta.release();
        assert!(meta.is_linked());
        meta.release();
        assert!(!meta.is_linked());
    }

    #[tokio::test]
    async fn test_dispatch_reaches_linked_output() {
        let meta = meta();
        let mut rx = meta.subscribe().unwrap();
        assert_eq!(meta.dispatch(Ping(7)), 1);

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("driver should forward the dispatched value");
        assert_eq!(received.unwrap(), Ping(7));
    }

    #[tokio::test]
    async fn test_dispatch_after_unlink_is_dropped() {
        let meta = meta();
        let rx = meta.subscribe().unwrap();
        assert_eq!(meta.dispatch(Ping(1)), 1);

        drop(rx);
        meta.release();
        assert_eq!(meta.dispatch(Ping(2)), 0);

        // Relinking opens a new input channel; the stale value is not replayed.
        let mut rx = meta.subscribe().unwrap();
        assert_eq!(meta.dispatch(Ping(3)), 1);
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("driver should forward the dispatched value");
        assert_eq!(received.unwrap(), Ping(3));
    }
}
