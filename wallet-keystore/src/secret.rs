use std::ops::Deref;

pub use aes_gcm::aead::heapless::Vec as HeaplessVec;
use thiserror::Error;
use zeroize::Zeroize;

/// Maximum size of a [`Secret`], in bytes.
pub const MAX_SECRET_SIZE: usize = 4096;

/// Secret (eg. a passphrase or a private key) used in keystore operations.
///
/// The data lives in a boxed `heapless::Vec`, so its address does not change when the
/// `Secret` itself is moved. That memory is locked where the platform allows it, to keep it
/// from being swapped out. Failure to lock is logged and otherwise ignored, as many
/// environments run with a tiny `RLIMIT_MEMLOCK`.
///
/// The data is zeroized when the `Secret` is dropped.
pub struct Secret {
    // dropped first, so the range is unlocked before the buffer is freed
    _guard: Option<MemoryLock>,
    data: Box<HeaplessVec<u8, MAX_SECRET_SIZE>>,
}

/// Keeps the secret's memory range locked until dropped.
struct MemoryLock(#[allow(dead_code)] region::LockGuard);

// The guard only records the address and length of the locked range.
unsafe impl Send for MemoryLock {}
unsafe impl Sync for MemoryLock {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("Provided secret is too large, maximum size is 4096 bytes")]
    TooLarge,
}

impl Secret {
    /// Creates a new `Secret` from some bytes, zeroizing the source.
    pub fn new<T: AsRef<[u8]> + Zeroize>(mut from: T) -> Result<Self, SecretError> {
        let data = HeaplessVec::from_slice(from.as_ref()).map_err(|_| SecretError::TooLarge)?;
        from.zeroize();

        Ok(Self::from_boxed(Box::new(data)))
    }

    /// Creates an empty secret, eg. the passphrase of an unprotected keystore.
    pub fn empty() -> Self {
        Self::from_boxed(Box::new(HeaplessVec::new()))
    }

    fn from_boxed(data: Box<HeaplessVec<u8, MAX_SECRET_SIZE>>) -> Self {
        let guard = match region::lock(data.as_ptr(), data.capacity()) {
            Ok(guard) => Some(MemoryLock(guard)),
            Err(e) => {
                tracing::trace!(error = %e, "cannot lock secret memory, continuing unlocked");
                None
            }
        };

        Self {
            data,
            _guard: guard,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Secret {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Deref for Secret {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::from_boxed(self.data.clone())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.data.as_slice() == other.data.as_slice()
    }
}

impl Eq for Secret {}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl Zeroize for Secret {
    fn zeroize(&mut self) {
        let bytes: &mut [u8] = &mut self.data;
        bytes.zeroize();
        self.data.clear();
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.zeroize();
    }
}
