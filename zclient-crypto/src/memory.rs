#![forbid(unsafe_code)]

use core::fmt;

use zeroize::Zeroize;

/// Ownership tag carried by every byte buffer a context holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryState {
    /// No memory, or memory that has already been released.
    Freed,
    /// Allocated by the context; wiped and released by the context exactly once.
    OwnedHeap,
    /// Caller-owned; the context only holds a borrow and never frees it.
    Borrowed,
}

enum Storage<'a> {
    Freed,
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

/// Byte buffer tagged with its [`MemoryState`].
///
/// Borrowed buffers are plain Rust borrows, so a context built on one cannot
/// outlive the caller's memory. Owned buffers are zeroized before they are
/// freed, either by [`TaggedBuf::release`] or on drop.
pub struct TaggedBuf<'a> {
    storage: Storage<'a>,
}

impl<'a> TaggedBuf<'a> {
    /// Borrow caller memory without taking ownership.
    pub fn borrowed(bytes: &'a [u8]) -> Self {
        Self { storage: Storage::Borrowed(bytes) }
    }

    /// Take ownership of an allocated buffer.
    pub fn owned(bytes: Vec<u8>) -> Self {
        Self { storage: Storage::Owned(bytes) }
    }

    /// Copy caller memory into a context-owned allocation.
    pub fn copied(bytes: &[u8]) -> Self {
        Self::owned(bytes.to_vec())
    }

    /// An empty, already-released buffer.
    pub fn freed() -> Self {
        Self { storage: Storage::Freed }
    }

    /// Current ownership tag.
    pub fn state(&self) -> MemoryState {
        match self.storage {
            Storage::Freed => MemoryState::Freed,
            Storage::Owned(_) => MemoryState::OwnedHeap,
            Storage::Borrowed(_) => MemoryState::Borrowed,
        }
    }

    /// Buffer contents; empty once released.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Freed => &[],
            Storage::Owned(v) => v.as_slice(),
            Storage::Borrowed(b) => b,
        }
    }

    /// Number of bytes held (0 once freed).
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// `true` when no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Whether the buffer has been released (or never held memory).
    pub fn is_freed(&self) -> bool {
        matches!(self.storage, Storage::Freed)
    }

    /// Release the buffer according to its tag.
    ///
    /// Owned memory is zeroized, then freed. Borrowed memory is forgotten
    /// without being touched. Calling this on a freed buffer is a no-op.
    pub fn release(&mut self) {
        self.release_observed(|_| {});
    }

    /// Release, handing the wiped owned bytes to `observe` right before they
    /// are freed. Lets tests confirm the zero-fill without reading
    /// deallocated memory.
    pub(crate) fn release_observed(&mut self, observe: impl FnOnce(&[u8])) {
        match core::mem::replace(&mut self.storage, Storage::Freed) {
            Storage::Owned(mut v) => {
                v.as_mut_slice().zeroize();
                observe(&v);
                // wipes spare capacity too, then truncates
                v.zeroize();
            }
            Storage::Borrowed(_) | Storage::Freed => {}
        }
    }
}

impl Drop for TaggedBuf<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<'a> From<&'a [u8]> for TaggedBuf<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::borrowed(bytes)
    }
}

impl From<Vec<u8>> for TaggedBuf<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::owned(bytes)
    }
}

impl fmt::Debug for TaggedBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedBuf")
            .field("state", &self.state())
            .field("len", &self.len())
            .finish()
    }
}
