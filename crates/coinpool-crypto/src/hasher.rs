use coinpool_types::Digest;

/// Maps payload bytes to a [`Digest`].
///
/// Implementations must be deterministic and pure. Hashing cannot fail: an
/// implementation that is unable to produce a digest must panic rather than
/// return a placeholder, since nothing downstream can recover without a
/// valid identifier.
pub trait DigestHasher: Send + Sync {
    fn digest(&self, bytes: &[u8]) -> Digest;
}

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so the same bytes hashed under two domains produce two
/// different digests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for pool entries.
    pub const ENTRY: Self = Self {
        domain: "coinpool-entry-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    /// Raw BLAKE3 hash without domain separation (for low-level use).
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::ENTRY
    }
}

impl DigestHasher for ContentHasher {
    fn digest(&self, bytes: &[u8]) -> Digest {
        self.hash(bytes)
    }
}
