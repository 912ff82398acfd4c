//! On-disk layout of a shared endpoint file.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ EndpointHeader (64B)                                         │
//! │  state │ magic │ version │ endpoint │ slots │ msg_cap │ stride │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Channel[0]   id │ active │ writer pid │ retired │ slot 0 │ slot 1 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Channel[1]                                                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ...                                                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Channel[channel_slots - 1]                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A zero-filled file is a valid uninitialised endpoint: every channel
//! record is vacant (id 0) and empty.

use crate::channel::Channel;
use msgslot_core::{BUF_LEN, EndpointId};
use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};

/// ASCII "MSGSLOT1".
pub const ENDPOINT_MAGIC: u64 = 0x4D53_4753_4C4F_5431;

/// Bump on any incompatible change to the header or `Channel` layout.
pub const ENDPOINT_VERSION: u64 = 2;

pub const STATE_UNINIT: u64 = 0;
pub const STATE_INITIALIZING: u64 = 1;
pub const STATE_READY: u64 = 2;

/// Header at offset 0 of every endpoint file.
///
/// All fields are atomics because several processes map the file at once.
/// Only the process that moves `state` from `STATE_UNINIT` to
/// `STATE_INITIALIZING` writes the other fields; everyone else waits for
/// `STATE_READY` before reading them.
#[repr(C, align(64))]
pub struct EndpointHeader {
    pub state: AtomicU64,
    pub magic: AtomicU64,
    pub version: AtomicU64,
    pub endpoint_id: AtomicU64,
    pub channel_slots: AtomicU64,
    pub msg_capacity: AtomicU64,
    pub channel_stride: AtomicU64,
}

impl EndpointHeader {
    /// Fills in the header fields. Caller must own the initialising state.
    pub fn init(&self, endpoint: EndpointId, channel_slots: usize) {
        self.magic.store(ENDPOINT_MAGIC, Ordering::Relaxed);
        self.version.store(ENDPOINT_VERSION, Ordering::Relaxed);
        self.endpoint_id.store(endpoint.0 as u64, Ordering::Relaxed);
        self.channel_slots.store(channel_slots as u64, Ordering::Relaxed);
        self.msg_capacity.store(BUF_LEN as u64, Ordering::Relaxed);
        self.channel_stride.store(size_of::<Channel>() as u64, Ordering::Relaxed);
        self.state.store(STATE_READY, Ordering::Release);
    }

    /// Checks a ready header against what the opener expects.
    pub fn validate(&self, endpoint: EndpointId, channel_slots: usize) -> Result<(), &'static str> {
        if self.state.load(Ordering::Acquire) != STATE_READY {
            return Err("Header not initialised");
        }
        if self.magic.load(Ordering::Relaxed) != ENDPOINT_MAGIC {
            return Err("Bad magic");
        }
        if self.version.load(Ordering::Relaxed) != ENDPOINT_VERSION {
            return Err("Wrong version");
        }
        if self.endpoint_id.load(Ordering::Relaxed) != endpoint.0 as u64 {
            return Err("Endpoint id mismatch");
        }
        if self.channel_slots.load(Ordering::Relaxed) != channel_slots as u64 {
            return Err("Channel slot count mismatch");
        }
        if self.msg_capacity.load(Ordering::Relaxed) != BUF_LEN as u64 {
            return Err("Message capacity mismatch");
        }
        if self.channel_stride.load(Ordering::Relaxed) != size_of::<Channel>() as u64 {
            return Err("Channel layout mismatch");
        }
        Ok(())
    }
}

/// Total bytes of an endpoint file with `channel_slots` records, or `None`
/// if that does not fit in the address space.
pub fn bytes_for_endpoint(channel_slots: usize) -> Option<usize> {
    channel_slots
        .checked_mul(size_of::<Channel>())?
        .checked_add(size_of::<EndpointHeader>())
}
