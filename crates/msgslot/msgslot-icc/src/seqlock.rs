//! Seqlock (sequence lock) slot for lock-free single-writer, multi-reader access.
//!
//! The writer bumps a sequence number to odd before touching the data and back
//! to even afterwards. Readers copy the data optimistically and keep the copy
//! only if the sequence was even and unchanged across it.
//!
//! In a channel the seqlock is the second line of defence. The double buffer
//! already keeps a writer away from the slot readers are pointed at; the
//! sequence catches the one case it cannot: a reader that loaded the active
//! index, stalled, and got lapped by two consecutive writes.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering, fence};

/// A value guarded by a sequence counter.
///
/// # Memory Layout
///
/// ```text
/// ┌─────────────────────────────────────┐
/// │  seq: AtomicU64  │  data: T         │
/// │  (8 bytes)       │  (size_of::<T>)  │
/// └─────────────────────────────────────┘
/// ```
///
/// An all-zero slot is valid whenever an all-zero `T` is: sequence 0 (stable)
/// holding a zeroed value. Memory-mapped channels rely on that.
#[repr(C, align(64))]
pub struct SeqlockSlot<T: Copy> {
    /// Odd = write in progress, even = stable.
    seq: AtomicU64,
    data: UnsafeCell<T>,
}

// SAFETY: the data cell is only written under the seqlock protocol by a single
// writer at a time (enforced by the caller of `write`), and readers discard
// any copy that overlapped a write.
unsafe impl<T: Copy + Send> Sync for SeqlockSlot<T> {}

impl<T: Copy> SeqlockSlot<T> {
    pub const fn new(value: T) -> Self {
        Self {
            seq: AtomicU64::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Stores `value` under the seqlock protocol.
    ///
    /// # Safety
    /// The caller must be the only writer of this slot for the duration of
    /// the call. Readers may run concurrently.
    #[inline(always)]
    pub unsafe fn write(&self, value: T) {
        // Already odd if a writer died mid-write; this write finishes it.
        let odd = self.seq.load(Ordering::Relaxed) | 1;
        self.seq.store(odd, Ordering::Relaxed);
        // Keep the data stores below from being reordered before the odd mark.
        fence(Ordering::Release);
        // SAFETY: sole writer per the contract above.
        unsafe { ptr::write_volatile(self.data.get(), value) };
        self.seq.store(odd.wrapping_add(1), Ordering::Release);
    }

    /// One read attempt: `None` if a write was in progress or overlapped it.
    /// Callers retry, typically after re-deciding which slot to read.
    #[inline(always)]
    pub fn try_read(&self) -> Option<T> {
        let s1 = self.seq.load(Ordering::Acquire);
        if s1 & 1 == 1 {
            return None;
        }

        // SAFETY: T is Copy and plain data; a torn copy is discarded below.
        let v = unsafe { ptr::read_volatile(self.data.get()) };

        fence(Ordering::Acquire);
        let s2 = self.seq.load(Ordering::Relaxed);
        (s1 == s2).then_some(v)
    }

    /// Number of completed writes since the slot was created.
    #[inline]
    pub fn writes(&self) -> u64 {
        self.seq.load(Ordering::Acquire) / 2
    }
}
