//! Message publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes notifications about **already committed** state to any
//! number of consumers. Storage is the source of truth; the bus only carries
//! hints, so:
//!
//! - **Best-effort**: a failed publish never undoes the commit that caused it
//! - **At-least-once acceptable**: consumers (cache invalidators) are idempotent
//! - **No persistence**: a consumer that was not subscribed misses the message

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a message stream.
///
/// Each subscription receives a copy of every message published after it was
/// created (broadcast semantics).
///
/// ```ignore
/// let subscription = bus.subscribe();
/// while let Ok(revalidation) = subscription.recv() {
///     for key in &revalidation.keys {
///         cache.invalidate(key);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Collect everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic pub/sub bus.
///
/// Publishers call `publish` only after their transaction committed, so a
/// consumer never reacts to state that was rolled back:
///
/// ```text
/// mutation → commit → EventBus::publish → subscribers (cache invalidation, ...)
/// ```
///
/// `publish()` can fail (lock poisoned, broker unreachable). Callers log the
/// failure; the committed state stands either way.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
