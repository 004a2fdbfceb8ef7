//! In-memory change feed.

use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::bus::{ChangeFeed, Subscription};
use crate::envelope::Envelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InMemoryFeedError {
    /// Publish failed due to internal lock poisoning.
    #[error("change feed lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct FeedState<M> {
    next_sequence: u64,
    subscribers: Vec<mpsc::UnboundedSender<Envelope<M>>>,
}

/// In-memory pub/sub feed.
///
/// - No IO
/// - Fan-out happens under one lock, so every subscriber sees the same order
/// - Sequence numbers start at 1
#[derive(Debug)]
pub struct InMemoryChangeFeed<M> {
    state: Mutex<FeedState<M>>,
}

impl<M> InMemoryChangeFeed<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryChangeFeed<M> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FeedState {
                next_sequence: 1,
                subscribers: Vec::new(),
            }),
        }
    }
}

impl<M> ChangeFeed<M> for InMemoryChangeFeed<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryFeedError;

    fn publish(&self, message: M) -> Result<u64, Self::Error> {
        let mut state = self.state.lock().map_err(|_| InMemoryFeedError::Poisoned)?;

        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let envelope = Envelope::new(sequence, Utc::now(), message);

        // Drop any released subscribers while publishing.
        state
            .subscribers
            .retain(|tx| tx.send(envelope.clone()).is_ok());

        Ok(sequence)
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::unbounded_channel();

        // If the lock is poisoned, we still return a subscription;
        // it just never receives anything.
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.push(tx);
        }

        Subscription::new(rx)
    }

    fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}
