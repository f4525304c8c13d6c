//! Output handles returned by [`EventBus::get`](super::EventBus::get).

use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::meta::EventMeta;
use super::source::{receiver_stream, BusEvent};
use crate::error::Result;

/// Shared, merged output of one event type
///
/// Every handle for the same type on the same bus refers to the same output,
/// whatever sources come and go.
pub struct EventStream<E: BusEvent> {
    meta: Arc<EventMeta<E>>,
}

impl<E: BusEvent> EventStream<E> {
    pub(crate) fn new(meta: Arc<EventMeta<E>>) -> Self {
        Self { meta }
    }

    /// Start receiving values emitted from now on
    ///
    /// The first receiver links the registered sources; the merge is shared
    /// by every later receiver and torn down when the last one is dropped.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self) -> Result<EventReceiver<E>> {
        let rx = self.meta.subscribe()?;
        Ok(EventReceiver {
            inner: receiver_stream(rx, self.meta.event_type()),
            claim: Claim {
                meta: Arc::clone(&self.meta),
            },
        })
    }

    /// Whether both handles refer to the same output
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.meta, &other.meta)
    }

    /// Number of live receivers
    pub fn subscriber_count(&self) -> usize {
        self.meta.subscriber_count()
    }

    /// Whether the sources are currently linked to the output
    pub fn is_linked(&self) -> bool {
        self.meta.is_linked()
    }
}

impl<E: BusEvent> Clone for EventStream<E> {
    fn clone(&self) -> Self {
        Self {
            meta: Arc::clone(&self.meta),
        }
    }
}

impl<E: BusEvent> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("event_type", &self.meta.event_type())
            .field("subscribers", &self.meta.subscriber_count())
            .finish()
    }
}

/// Releases a receiver's hold on the shared link when dropped
struct Claim<E: BusEvent> {
    meta: Arc<EventMeta<E>>,
}

impl<E: BusEvent> Drop for Claim<E> {
    fn drop(&mut self) {
        self.meta.release();
    }
}

/// One consumer's view of an [`EventStream`]
///
/// Never ends on its own. A receiver that falls more than the configured
/// channel capacity behind skips the oldest values.
pub struct EventReceiver<E: BusEvent> {
    inner: BoxStream<'static, E>,
    claim: Claim<E>,
}

impl<E: BusEvent> EventReceiver<E> {
    /// Wait for the next value
    pub async fn recv(&mut self) -> Option<E> {
        self.inner.next().await
    }
}

impl<E: BusEvent> Stream for EventReceiver<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<E: BusEvent> fmt::Debug for EventReceiver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReceiver")
            .field("event_type", &self.claim.meta.event_type())
            .finish()
    }
}
