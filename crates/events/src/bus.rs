//! Change feed abstraction (publish/subscribe mechanics only).
//!
//! A change feed distributes notifications to every live subscriber
//! (broadcast semantics). It replaces callback registration with an explicit
//! handle the consumer owns.
//!
//! ## Delivery order
//!
//! Every subscriber observes messages in publication order, and each message is
//! wrapped in an [`Envelope`] carrying the feed's sequence number. Messages
//! published before a subscription was created are never delivered to it.
//!
//! ## Cancellation
//!
//! Dropping a [`Subscription`] (or calling [`Subscription::unsubscribe`])
//! releases it. Nothing is delivered after that point, and the feed forgets the
//! subscriber no later than its next publish.

use tokio::sync::mpsc;

use crate::envelope::Envelope;

/// A subscription to a change feed.
///
/// ## Usage Pattern
///
/// ```ignore
/// let mut subscription = feed.subscribe();
///
/// while let Some(envelope) = subscription.recv().await {
///     apply(envelope.into_payload());
/// }
/// // `None`: the feed was dropped.
/// ```
///
/// Subscriptions are meant for a single consumer task. Unbounded buffering is
/// acceptable because change notifications are rare and tiny.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: mpsc::UnboundedReceiver<Envelope<M>>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: mpsc::UnboundedReceiver<Envelope<M>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<Envelope<M>> {
        self.receiver.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&mut self) -> Result<Envelope<M>, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Release the subscription explicitly.
    ///
    /// Equivalent to dropping it; queued but unread messages are discarded.
    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}

/// Domain-agnostic change feed (pub/sub abstraction).
///
/// The trait requires `Send + Sync` so one feed can be shared between the
/// publishing adapter and any number of consumers.
pub trait ChangeFeed<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    /// Publish a message to all live subscribers and return its sequence number.
    fn publish(&self, message: M) -> Result<u64, Self::Error>;

    fn subscribe(&self) -> Subscription<M>;

    /// Number of live subscriptions.
    fn subscriber_count(&self) -> usize;
}

impl<M, F> ChangeFeed<M> for std::sync::Arc<F>
where
    F: ChangeFeed<M> + ?Sized,
{
    type Error = F::Error;

    fn publish(&self, message: M) -> Result<u64, Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }

    fn subscriber_count(&self) -> usize {
        (**self).subscriber_count()
    }
}
