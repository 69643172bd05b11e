//! Typed broadcast event bus.
//!
//! Publishers never block: events fan out over a bounded broadcast
//! channel and slow subscribers skip ahead, observing how many events
//! they lost. Used for store→identity cache invalidation and the
//! daemon's secure-storage hints.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 64;

/// A broadcast bus for events of type `E`.
///
/// Cloning the bus yields another publisher handle onto the same
/// channel. Subscribers created before a publish observe it; a bus with
/// no subscribers drops events on the floor.
#[derive(Clone)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, event: E) {
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(subscribers = delivered, "event published");
    }

    /// A receiver positioned after every previously published event.
    pub fn subscribe(&self) -> Subscription<E> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// The subscription as a `Stream`, for `select!`-style pumps.
    pub fn stream(&self) -> BroadcastStream<E> {
        BroadcastStream::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single subscriber's position on the bus.
pub struct Subscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    /// Waits for the next event.
    ///
    /// A lagged subscriber skips to the oldest retained event and is
    /// told how many it missed; `None` means every publisher is gone.
    pub async fn recv(&mut self) -> Option<Event<E>> {
        match self.rx.recv().await {
            Ok(event) => Some(Event::Next(event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => Some(Event::Lagged(missed)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Non-blocking variant; `None` when no event is pending.
    pub fn try_recv(&mut self) -> Option<Event<E>> {
        match self.rx.try_recv() {
            Ok(event) => Some(Event::Next(event)),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => Some(Event::Lagged(missed)),
            Err(_) => None,
        }
    }
}

/// What a subscriber observes on each wakeup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<E> {
    Next(E),
    /// The subscriber fell behind; carries how many events it lost.
    Lagged(u64),
}

impl<E> Event<E> {
    /// The payload, if this wakeup carried one.
    pub fn into_next(self) -> Option<E> {
        match self {
            Self::Next(event) => Some(event),
            Self::Lagged(_) => None,
        }
    }
}
