//! Hashing collaborator for coinpool.
//!
//! The pool never hashes anything itself. Entries obtain their [`Digest`]
//! through a [`DigestHasher`]; [`ContentHasher`] is the domain-separated
//! BLAKE3 implementation used by default.
//!
//! All crypto operations wrap established libraries — no custom cryptography.
//!
//! [`Digest`]: coinpool_types::Digest

pub mod hasher;

pub use hasher::{ContentHasher, DigestHasher};
