//! Invitation token generation and hashing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Default number of random bytes in a token.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Source of cryptographically secure random bytes.
pub trait SecureRandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Operating-system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl SecureRandomSource for OsRandomSource {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Generates a URL-safe token from `length` random bytes.
///
/// The bytes are base64url encoded without padding, so 32 bytes become a
/// 43 character token.
///
/// # Example
///
/// ```rust
/// use teamgate::crypto::{generate_token, OsRandomSource};
///
/// let token = generate_token(&OsRandomSource, 32);
/// assert_eq!(token.len(), 43);
/// ```
pub fn generate_token(source: &dyn SecureRandomSource, length: usize) -> String {
    let mut bytes = vec![0u8; length];
    source.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hashes a token using SHA-256 for storage.
/// Tokens are high-entropy random strings, so a fast hash is appropriate.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(any(test, feature = "mocks"))]
mod sequence {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::SecureRandomSource;

    /// Deterministic byte source for tests: every call yields a distinct,
    /// reproducible fill derived from a counter.
    #[derive(Debug, Default)]
    pub struct SequenceRandomSource {
        counter: AtomicU64,
    }

    impl SequenceRandomSource {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl SecureRandomSource for SequenceRandomSource {
        fn fill_bytes(&self, dest: &mut [u8]) {
            let seed = self.counter.fetch_add(1, Ordering::SeqCst).to_le_bytes();
            for (i, byte) in dest.iter_mut().enumerate() {
                *byte = seed[i % seed.len()].wrapping_add(i as u8);
            }
        }
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use sequence::SequenceRandomSource;
