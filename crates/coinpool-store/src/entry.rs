use coinpool_crypto::{ContentHasher, DigestHasher};
use coinpool_types::{Digest, Priority};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// An immutable pool record: owned payload bytes plus derived metadata.
///
/// The `id` is the digest of the payload and `size` its length; both are
/// fixed at construction. `sequence` is assigned by the store when the entry
/// is accepted and stays `None` until then. There are no mutators: replacing
/// an entry means removing it and inserting a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    payload: Vec<u8>,
    id: Digest,
    size: u64,
    sequence: Option<u64>,
    priority: Priority,
}

impl Entry {
    /// Build an entry with default rules: empty payloads are rejected and the
    /// digest is computed with [`ContentHasher::ENTRY`].
    pub fn new(payload: Vec<u8>) -> StoreResult<Self> {
        Self::builder(payload).build()
    }

    /// Build an entry with an explicit eviction priority.
    pub fn with_priority(payload: Vec<u8>, priority: Priority) -> StoreResult<Self> {
        Self::builder(payload).priority(priority).build()
    }

    pub fn builder(payload: Vec<u8>) -> EntryBuilder {
        EntryBuilder::new(payload)
    }

    pub fn id(&self) -> Digest {
        self.id
    }

    /// Payload length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Insertion sequence, if the entry has been accepted by a store.
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the entry and hand back its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Metadata view without the payload bytes.
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            id: self.id,
            size: self.size,
            sequence: self.sequence,
            priority: self.priority,
        }
    }

    pub(crate) fn assign_sequence(&mut self, sequence: u64) {
        self.sequence = Some(sequence);
    }
}

/// Builder for [`Entry`].
#[derive(Debug)]
pub struct EntryBuilder {
    payload: Vec<u8>,
    priority: Priority,
    allow_empty: bool,
}

impl EntryBuilder {
    fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            priority: Priority::MIN,
            allow_empty: false,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Permit an empty payload.
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Finish with the default [`ContentHasher::ENTRY`] hasher.
    pub fn build(self) -> StoreResult<Entry> {
        self.build_with(&ContentHasher::ENTRY)
    }

    /// Finish using a caller-supplied hashing collaborator.
    pub fn build_with<H: DigestHasher + ?Sized>(self, hasher: &H) -> StoreResult<Entry> {
        if self.payload.is_empty() && !self.allow_empty {
            return Err(StoreError::invalid_payload("payload is empty"));
        }
        let id = hasher.digest(&self.payload);
        let size = self.payload.len() as u64;
        Ok(Entry {
            payload: self.payload,
            id,
            size,
            sequence: None,
            priority: self.priority,
        })
    }
}

/// Payload-free description of a stored entry, as yielded by store snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub id: Digest,
    pub size: u64,
    pub sequence: Option<u64>,
    pub priority: Priority,
}
