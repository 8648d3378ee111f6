//! Concurrent, size-bounded entry store for UTXO sets and mempools.
//!
//! Entries are immutable payloads keyed by the [`Digest`] of their bytes. The
//! store keeps a running byte total, evicts under memory pressure through a
//! pluggable [`EvictionPolicy`], and applies block-style updates atomically
//! through a [`BatchCoordinator`].
//!
//! # Components
//!
//! - [`Entry`] -- owned payload plus id, size, sequence and priority
//! - [`IndexedStore`] -- the `RwLock`-guarded map with O(1) size and count
//! - [`EvictionPolicy`] -- [`SizeFifo`] (oldest first) or [`PriorityOrder`]
//!   (lowest fee rate first, oldest first on ties)
//! - [`BatchCoordinator`] -- all-or-nothing batches of removes and upserts
//!
//! # Design Rules
//!
//! 1. Entries are immutable; replacing one means remove then insert.
//! 2. The store owns an entry while it is present; `remove` hands it back.
//! 3. `insert` never overwrites: a present id is a `DuplicateKey` error.
//! 4. Eviction never drops the entries whose arrival triggered it.
//! 5. A rejected batch leaves the store exactly as it was.
//! 6. No operation performs I/O or blocks beyond a short lock section.
//!
//! [`Digest`]: coinpool_types::Digest

pub mod batch;
pub mod config;
pub mod entry;
pub mod error;
pub mod eviction;
pub mod stats;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use batch::{Batch, BatchCoordinator, BatchOp, BatchReport};
pub use config::StoreConfig;
pub use entry::{Entry, EntryBuilder, EntrySummary};
pub use error::{BatchError, ConfigError, StoreError, StoreResult};
pub use eviction::{
    Candidate, EvictionPolicy, EvictionPolicyKind, EvictionView, PriorityOrder, SizeFifo,
};
pub use stats::StoreStats;
pub use store::{EntryRef, IndexedStore, StoreSnapshot};
