//! Pluggable eviction policies.
//!
//! When an insert or batch pushes the store over its capacity, the store asks
//! its [`EvictionPolicy`] for victims through an [`EvictionView`]: a read-only
//! window onto the locked store state that already excludes protected keys
//! (the entries whose arrival triggered eviction). The store keeps calling the
//! policy until it is back under capacity or the policy returns no victims.

use std::collections::HashSet;
use std::fmt;

use coinpool_types::{Digest, Priority};
use serde::{Deserialize, Serialize};

use crate::store::StoreState;

/// An eviction candidate as seen by a policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub id: Digest,
    pub size: u64,
    pub sequence: u64,
    pub priority: Priority,
}

/// Read-only view of evictable entries.
pub struct EvictionView<'a> {
    state: &'a StoreState,
    protected: &'a HashSet<Digest>,
}

impl<'a> EvictionView<'a> {
    pub(crate) fn new(state: &'a StoreState, protected: &'a HashSet<Digest>) -> Self {
        Self { state, protected }
    }

    /// Candidates in ascending insertion sequence.
    pub fn oldest_first(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.state
            .by_sequence
            .values()
            .filter_map(|id| self.candidate(id))
    }

    /// Candidates in ascending priority; equal priorities oldest first.
    pub fn lowest_priority_first(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.state
            .by_priority
            .iter()
            .filter_map(|(_, _, id)| self.candidate(id))
    }

    /// Number of evictable entries.
    pub fn len(&self) -> usize {
        self.state.entries.len() - self.protected_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of present entries shielded from eviction.
    pub fn protected_count(&self) -> usize {
        self.protected
            .iter()
            .filter(|id| self.state.entries.contains_key(id))
            .count()
    }

    fn candidate(&self, id: &Digest) -> Option<Candidate> {
        if self.protected.contains(id) {
            return None;
        }
        let entry = self.state.entries.get(id)?;
        Some(Candidate {
            id: *id,
            size: entry.size(),
            sequence: entry.sequence()?,
            priority: entry.priority(),
        })
    }
}

/// Strategy choosing which entries to drop when the store is over capacity.
///
/// A policy is installed when the store is built and never swapped.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return victims, in eviction order, whose combined size covers
    /// `bytes_to_free` if possible. An empty result means nothing more can be
    /// evicted.
    fn select_victims(&self, view: &EvictionView<'_>, bytes_to_free: u64) -> Vec<Digest>;
}

/// Oldest entries first.
#[derive(Clone, Copy, Debug, Default)]
pub struct SizeFifo;

impl EvictionPolicy for SizeFifo {
    fn name(&self) -> &'static str {
        "size_fifo"
    }

    fn select_victims(&self, view: &EvictionView<'_>, bytes_to_free: u64) -> Vec<Digest> {
        take_until_freed(view.oldest_first(), bytes_to_free)
    }
}

/// Lowest priority first; ties broken by insertion order, oldest first.
#[derive(Clone, Copy, Debug, Default)]
pub struct PriorityOrder;

impl EvictionPolicy for PriorityOrder {
    fn name(&self) -> &'static str {
        "priority_order"
    }

    fn select_victims(&self, view: &EvictionView<'_>, bytes_to_free: u64) -> Vec<Digest> {
        take_until_freed(view.lowest_priority_first(), bytes_to_free)
    }
}

fn take_until_freed(candidates: impl Iterator<Item = Candidate>, bytes_to_free: u64) -> Vec<Digest> {
    let mut freed = 0u64;
    let mut victims = Vec::new();
    for candidate in candidates {
        if freed >= bytes_to_free {
            break;
        }
        freed = freed.saturating_add(candidate.size);
        victims.push(candidate.id);
    }
    victims
}

/// Configuration tag selecting a built-in policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicyKind {
    #[default]
    SizeFifo,
    PriorityOrder,
}

impl EvictionPolicyKind {
    pub fn build(self) -> Box<dyn EvictionPolicy> {
        match self {
            Self::SizeFifo => Box::new(SizeFifo),
            Self::PriorityOrder => Box::new(PriorityOrder),
        }
    }
}

impl fmt::Display for EvictionPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeFifo => write!(f, "size_fifo"),
            Self::PriorityOrder => write!(f, "priority_order"),
        }
    }
}
