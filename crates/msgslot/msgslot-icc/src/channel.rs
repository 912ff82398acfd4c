//! A channel: one pending message, double-buffered.
//!
//! ```text
//!            active ──┐
//!                     v
//!   ┌───────────────────────┬───────────────────────┐
//!   │ slot 0 (seqlock)      │ slot 1 (seqlock)      │
//!   │ last published msg    │ next write target     │
//!   └───────────────────────┴───────────────────────┘
//! ```
//!
//! A write fills the inactive slot completely, then flips `active` to it.
//! The flip is the only publication point, so a reader going through
//! `active` sees either the previous message or the new one, never a mix.
//! Nothing queues: each write supersedes whatever was there, read or not.
//!
//! Writers to the same channel take turns through a short claim: a word
//! holding the pid of the process inside `write`, held only for the copy.
//! Readers never take it. The claim can sit in a shared file, so a claim
//! left behind by a process that exited is taken over, and a live holder is
//! waited on for at most `CLAIM_TIMEOUT`.

use crate::seqlock::SeqlockSlot;
use msgslot_core::{BUF_LEN, ChannelId, MessageBuffer, SlotError, SlotResult};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Busy spins on a held claim before checking on its holder.
const CLAIM_SPINS: u32 = 1 << 16;

/// Longest a writer waits on a claim whose holder is still running.
pub const CLAIM_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared state of one channel.
///
/// `#[repr(C)]` and zero-valid: an all-zero `Channel` is a vacant, empty
/// channel, which is what a freshly sized endpoint file contains.
#[repr(C, align(64))]
pub struct Channel {
    /// Raw channel id; 0 while the record is vacant.
    id: AtomicU64,
    /// Index of the readable slot, 0 or 1.
    active: AtomicU32,
    /// Pid of the process holding the writer claim; 0 when free.
    writer: AtomicU32,
    retired: AtomicBool,
    slots: [SeqlockSlot<MessageBuffer>; 2],
}

/// Held by the one writer allowed into a channel; released on drop.
struct WriterClaim<'a>(&'a AtomicU32);

impl Drop for WriterClaim<'_> {
    fn drop(&mut self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Whether `pid` names a running process. `EPERM` still means it exists.
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs the existence check only; nothing is sent.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id: AtomicU64::new(id.get()),
            active: AtomicU32::new(0),
            writer: AtomicU32::new(0),
            retired: AtomicBool::new(false),
            slots: [
                SeqlockSlot::new(MessageBuffer::EMPTY),
                SeqlockSlot::new(MessageBuffer::EMPTY),
            ],
        }
    }

    /// `None` for a vacant record in a shared table.
    pub fn id(&self) -> Option<ChannelId> {
        ChannelId::new(self.id.load(Ordering::Acquire)).ok()
    }

    /// Claims a vacant record for `id`. On failure returns the id already
    /// stored there, which may be `id` itself if another party won the race.
    pub(crate) fn claim(&self, id: ChannelId) -> Result<(), u64> {
        self.id
            .compare_exchange(0, id.get(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    #[inline]
    pub(crate) fn raw_id(&self) -> u64 {
        self.id.load(Ordering::Acquire)
    }

    fn claim_writer(&self) -> SlotResult<WriterClaim<'_>> {
        let me = std::process::id();
        let mut spins = 0u32;
        let mut deadline = None;

        loop {
            let holder = match self
                .writer
                .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return Ok(WriterClaim(&self.writer)),
                Err(0) => continue,
                Err(holder) => holder,
            };

            if spins < CLAIM_SPINS {
                spins += 1;
                std::hint::spin_loop();
                continue;
            }

            if !process_alive(holder) {
                if self
                    .writer
                    .compare_exchange(holder, me, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    tracing::warn!(channel = self.raw_id(), holder, "took over writer claim of exited process");
                    return Ok(WriterClaim(&self.writer));
                }
                continue;
            }

            let deadline = *deadline.get_or_insert_with(|| Instant::now() + CLAIM_TIMEOUT);
            if Instant::now() >= deadline {
                return Err(SlotError::Busy { holder });
            }
            std::thread::yield_now();
        }
    }

    /// Publishes `payload` as the channel's message, replacing any previous
    /// one. Returns the number of bytes written.
    ///
    /// # Errors
    /// - `InvalidArgument` if `payload` is empty or longer than `BUF_LEN`
    /// - `DataLoss` if the owning endpoint was torn down
    /// - `Busy` if another live writer held the channel past `CLAIM_TIMEOUT`
    pub fn write(&self, payload: &[u8]) -> SlotResult<usize> {
        let msg = MessageBuffer::from_payload(payload)?;

        let _claim = self.claim_writer()?;
        if self.is_retired() {
            return Err(SlotError::DataLoss);
        }
        let target = 1 - (self.active.load(Ordering::Relaxed) & 1);
        // SAFETY: the writer claim makes us the only writer of either slot.
        unsafe { self.slots[target as usize].write(msg) };
        self.active.store(target, Ordering::Release);

        Ok(msg.len())
    }

    /// A consistent copy of the most recently published message.
    pub fn snapshot(&self) -> MessageBuffer {
        loop {
            let active = self.active.load(Ordering::Acquire) & 1;
            // A stale index can point at the slot a writer is refilling, or
            // has refilled but not flipped to yet. Neither is published, so
            // go back to `active` rather than wait on that slot.
            if let Some(msg) = self.slots[active as usize].try_read() {
                if self.active.load(Ordering::Acquire) & 1 == active {
                    return msg;
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Copies exactly `requested` bytes of the current (zero-padded) slot
    /// into `dst` and returns the true length of the message.
    ///
    /// Checks run in this order, and the first failure wins:
    /// 1. `WouldBlock`: nothing has ever been written
    /// 2. `InsufficientSpace`: `requested` is shorter than the message
    /// 3. `MessageTooLarge`: `requested` is larger than `BUF_LEN`
    /// 4. `InvalidArgument`: `dst` cannot hold `requested` bytes
    ///
    /// `dst` is untouched on every error.
    pub fn read_into(&self, requested: usize, dst: &mut [u8]) -> SlotResult<usize> {
        if self.is_retired() {
            return Err(SlotError::DataLoss);
        }

        let msg = self.snapshot();
        if msg.is_empty() {
            return Err(SlotError::WouldBlock);
        }
        if requested < msg.len() {
            return Err(SlotError::InsufficientSpace {
                needed: msg.len(),
                available: requested,
            });
        }
        if requested > BUF_LEN {
            return Err(SlotError::MessageTooLarge {
                requested,
                capacity: BUF_LEN,
            });
        }
        let Some(out) = dst.get_mut(..requested) else {
            return Err(SlotError::InvalidArgument("destination shorter than requested length"));
        };

        out.copy_from_slice(&msg.padded()[..requested]);
        Ok(msg.len())
    }

    /// Whether a message is currently stored.
    pub fn has_message(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Number of writes published to this channel.
    pub fn published(&self) -> u64 {
        self.slots[0].writes() + self.slots[1].writes()
    }

    #[inline]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Marks the channel dead. Returns whether it still held a message.
    pub(crate) fn retire(&self) -> bool {
        // Retire even past a stuck writer; its flip can no longer be read.
        let _claim = self.claim_writer().ok();
        self.retired.store(true, Ordering::Release);
        self.has_message()
    }
}

#[cfg(test)]
pub(crate) const WRITER_OFFSET: usize = std::mem::offset_of!(Channel, writer);

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.raw_id())
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}
