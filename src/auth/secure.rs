//! Zeroizing storage for sensitive bytes.
//!
//! `SecureBuffer` holds private key material and bearer tokens. It shrinks
//! the accidental-exposure window (process dumps, reused allocations); it is
//! not a boundary against a privileged attacker.

use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use zeroize::Zeroize;

/// Failure modes for scoped borrows of a [`SecureBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecureBufferError {
    #[error("secure buffer has been cleared")]
    Cleared,
    #[error("secure buffer does not hold valid UTF-8")]
    NotUtf8,
    #[error("invalid base64 input: {0}")]
    InvalidBase64(String),
}

struct SecureBytes {
    bytes: Vec<u8>,
    cleared: bool,
}

impl Drop for SecureBytes {
    fn drop(&mut self) {
        // zeroize uses volatile writes, so the wipe survives optimization.
        self.bytes.zeroize();
    }
}

/// Heap buffer for sensitive bytes with explicit, idempotent zeroization.
///
/// Contents are only reachable through scoped borrows; after [`clear`] the
/// length is zero and borrows fail.
///
/// [`clear`]: SecureBuffer::clear
pub struct SecureBuffer {
    inner: Mutex<SecureBytes>,
}

impl SecureBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Mutex::new(SecureBytes {
                bytes,
                cleared: false,
            }),
        }
    }

    pub fn from_str(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SecureBufferError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| SecureBufferError::InvalidBase64(e.to_string()))?;
        Ok(Self::new(bytes))
    }

    /// Current length in bytes; 0 after [`clear`](SecureBuffer::clear).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("secure buffer mutex poisoned").bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_cleared(&self) -> bool {
        self.inner.lock().expect("secure buffer mutex poisoned").cleared
    }

    /// Invoke `f` with a read-only view of the contents. Any copy `f` makes is
    /// the caller's to manage.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, SecureBufferError> {
        let guard = self.inner.lock().expect("secure buffer mutex poisoned");
        if guard.cleared {
            return Err(SecureBufferError::Cleared);
        }
        Ok(f(&guard.bytes))
    }

    /// Invoke `f` with the contents as `&str`.
    pub fn with_utf8<R>(&self, f: impl FnOnce(&str) -> R) -> Result<R, SecureBufferError> {
        let guard = self.inner.lock().expect("secure buffer mutex poisoned");
        if guard.cleared {
            return Err(SecureBufferError::Cleared);
        }
        let text = std::str::from_utf8(&guard.bytes).map_err(|_| SecureBufferError::NotUtf8)?;
        Ok(f(text))
    }

    /// Overwrite the storage with zeros and mark the buffer cleared.
    /// Idempotent.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().expect("secure buffer mutex poisoned");
        guard.bytes.zeroize();
        guard.bytes.clear();
        guard.cleared = true;
    }
}

impl std::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the contents.
        f.debug_struct("SecureBuffer")
            .field("len", &self.len())
            .field("cleared", &self.is_cleared())
            .finish()
    }
}
