//! Foundation types for coinpool.
//!
//! Every other coinpool crate depends on `coinpool-types`. The types here are
//! small, `Copy`, and carry no behaviour beyond comparison and encoding.
//!
//! # Key Types
//!
//! - [`Digest`] — 32-byte content identifier of a pool entry
//! - [`Priority`] — Comparable eviction priority (e.g. fee rate)

pub mod digest;
pub mod error;
pub mod priority;

pub use digest::Digest;
pub use error::TypeError;
pub use priority::Priority;
