//! Time-ordered scheduling queue
//!
//! Deferred actions keyed by `(due_time, identity)`. Iteration order is
//! ascending due time, ties broken by identity, and it must be identical on
//! every node. The persisted key is `due_time` big-endian followed by the
//! identity bytes, so byte order of keys equals queue order.
//!
//! [`TimeQueue::due_by`] only reads. Callers remove each entry after they
//! have processed it, so a consumer that fails halfway never loses entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tally_types::{Address, Timestamp};

/// Identity type usable as a queue member. Its byte encoding must be fixed
/// width and order-preserving with respect to `Ord`.
pub trait QueueIdentity: Ord + Clone {
    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Option<Self>;
}

impl QueueIdentity for Address {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        Address::from_slice(bytes).ok()
    }
}

/// Storage key for one entry: `due_time (8 bytes BE) ‖ identity`.
pub fn encode_queue_key<I: QueueIdentity>(due: Timestamp, identity: &I) -> Vec<u8> {
    let id = identity.encode();
    let mut key = Vec::with_capacity(8 + id.len());
    key.extend_from_slice(&due.to_be_bytes());
    key.extend_from_slice(&id);
    key
}

pub fn decode_queue_key<I: QueueIdentity>(key: &[u8]) -> Option<(Timestamp, I)> {
    if key.len() < 8 {
        return None;
    }
    let (due, id) = key.split_at(8);
    Some((Timestamp::from_be_slice(due)?, I::decode(id)?))
}

/// Sorted multimap of scheduled identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "I: Serialize",
    deserialize = "I: Deserialize<'de> + Ord"
))]
pub struct TimeQueue<I> {
    entries: BTreeSet<(Timestamp, I)>,
}

impl<I> Default for TimeQueue<I> {
    fn default() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }
}

impl<I: QueueIdentity> TimeQueue<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the exact entry was already present.
    pub fn insert(&mut self, identity: I, due: Timestamp) -> bool {
        self.entries.insert((due, identity))
    }

    /// Returns `false` if the entry was not present.
    pub fn remove(&mut self, identity: &I, due: Timestamp) -> bool {
        self.entries.remove(&(due, identity.clone()))
    }

    pub fn has(&self, identity: &I, due: Timestamp) -> bool {
        self.entries.contains(&(due, identity.clone()))
    }

    /// Every entry with `due <= cutoff`, in ascending `(due, identity)`
    /// order. Does not mutate the queue.
    pub fn due_by(&self, cutoff: Timestamp) -> impl Iterator<Item = (Timestamp, &I)> + '_ {
        self.entries
            .iter()
            .take_while(move |(due, _)| *due <= cutoff)
            .map(|(due, identity)| (*due, identity))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &I)> + '_ {
        self.entries.iter().map(|(due, identity)| (*due, identity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I: QueueIdentity> FromIterator<(Timestamp, I)> for TimeQueue<I> {
    fn from_iter<T: IntoIterator<Item = (Timestamp, I)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
