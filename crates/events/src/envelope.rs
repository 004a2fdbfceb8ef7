use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for a published change notification.
///
/// Notes:
/// - `sequence_number` is assigned by the feed at publish time and is strictly
///   increasing per feed. A consumer holding two envelopes can always tell
///   which one is newer; the larger number supersedes.
/// - `payload` is the domain message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    message_id: Uuid,

    /// Monotonically increasing position in the feed.
    sequence_number: u64,

    published_at: DateTime<Utc>,

    payload: M,
}

impl<M> Envelope<M> {
    pub fn new(sequence_number: u64, published_at: DateTime<Utc>, payload: M) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            sequence_number,
            published_at,
            payload,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn payload(&self) -> &M {
        &self.payload
    }

    pub fn into_payload(self) -> M {
        self.payload
    }

    /// True if `self` was published after `other` on the same feed.
    pub fn supersedes<N>(&self, other: &Envelope<N>) -> bool {
        self.sequence_number > other.sequence_number
    }
}
