//! Memory-mapped endpoints shared between processes.
//!
//! Each endpoint is one file (`<dir>/slot<id>`) laid out as described in
//! [`shm_layout`](crate::shm_layout). Any number of processes may open the
//! same file; they share its channels exactly as threads share an in-process
//! [`ChannelTable`](crate::ChannelTable).
//!
//! # Channel lookup
//! The channel records form an open-addressed table keyed by channel id,
//! with id 0 marking a vacant record. Lookup probes linearly from a hashed
//! home slot; a vacant record is claimed with a compare-and-swap on its id,
//! so two processes creating the same channel end up on the same record.
//! Records are never freed, which keeps the probe sequence of every id
//! stable.

use crate::channel::Channel;
use crate::probe::{TableConfig, probe_index};
use crate::shm_layout::{
    EndpointHeader, STATE_INITIALIZING, STATE_READY, STATE_UNINIT, bytes_for_endpoint,
};
use crate::table::ChannelSource;
use msgslot_core::{ChannelId, EndpointId, SlotError, SlotResult};
use msgslot_mmap::SharedMapping;
use std::fs;
use std::io;
use std::mem::size_of;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// How long an opener waits for another process to finish writing the header.
const INIT_SPIN_LIMIT: u32 = 1 << 22;

/// One endpoint file, mapped read-write.
pub struct ShmEndpoint {
    /// Owns the mapping; everything else points into it.
    _map: SharedMapping,
    base: *mut u8,
    id: EndpointId,
    cfg: TableConfig,
    path: PathBuf,
}

// SAFETY: after `open` the mapped region is only accessed through atomics
// and seqlock slots (`EndpointHeader`, `Channel`), which are built for
// concurrent access from any thread or process.
unsafe impl Send for ShmEndpoint {}
unsafe impl Sync for ShmEndpoint {}

impl ShmEndpoint {
    /// Conventional file path of endpoint `id` under `dir`.
    pub fn endpoint_path<P: AsRef<Path>>(dir: P, id: EndpointId) -> PathBuf {
        dir.as_ref().join(format!("slot{}", id.0))
    }

    /// Opens endpoint `id` under `dir`, creating the directory and file on
    /// first use.
    pub fn open_in<P: AsRef<Path>>(dir: P, id: EndpointId, cfg: TableConfig) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Self::open(Self::endpoint_path(dir, id), id, cfg)
    }

    /// Opens (creating if needed) the endpoint file at `path`.
    ///
    /// # Errors
    /// - file creation or mapping fails
    /// - `InvalidInput`: the table is too large to address
    /// - `InvalidData`: the file was laid out for a different endpoint id,
    ///   slot count, message capacity or format version
    /// - `TimedOut`: another process claimed the header but never finished
    ///   writing it
    pub fn open<P: AsRef<Path>>(path: P, id: EndpointId, cfg: TableConfig) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = bytes_for_endpoint(cfg.channel_slots).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} channel slots do not fit in memory", cfg.channel_slots),
            )
        })?;
        let mut map = SharedMapping::open_or_create(&path, bytes as u64)?;
        let base = map.as_mut_ptr();

        // SAFETY: the mapping is at least `bytes` long, page aligned, and an
        // EndpointHeader of any bit pattern is made of plain atomics.
        let header = unsafe { &*(base as *const EndpointHeader) };

        match header.state.compare_exchange(
            STATE_UNINIT,
            STATE_INITIALIZING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                header.init(id, cfg.channel_slots);
                tracing::info!(endpoint = %id, path = %path.display(), slots = cfg.channel_slots, "shared endpoint created");
            }
            Err(_) => wait_until_ready(header)?,
        }

        header
            .validate(id, cfg.channel_slots)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Self {
            _map: map,
            base,
            id,
            cfg,
            path,
        })
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.cfg.channel_slots
    }

    #[inline(always)]
    fn channel_at(&self, idx: usize) -> &Channel {
        debug_assert!(idx < self.cfg.channel_slots);
        // SAFETY: idx is masked into range by `probe_index`; records start
        // right after the 64-byte header and are 64-byte aligned; a Channel
        // of any bit pattern is valid (atomics and POD slots).
        unsafe {
            let records = self.base.add(size_of::<EndpointHeader>()) as *const Channel;
            &*records.add(idx)
        }
    }

    /// Index of the record for `id`, claiming a vacant one if needed.
    fn find_or_claim(&self, id: ChannelId) -> SlotResult<usize> {
        let raw = id.get();
        let mask = self.cfg.mask();

        for attempt in 0..self.cfg.channel_slots as u64 {
            let idx = probe_index(raw, attempt, mask);
            let record = self.channel_at(idx);
            match record.raw_id() {
                current if current == raw => return Ok(idx),
                0 => match record.claim(id) {
                    Ok(()) => {
                        tracing::debug!(endpoint = %self.id, channel = %id, record = idx, "channel created");
                        return Ok(idx);
                    }
                    Err(current) if current == raw => return Ok(idx),
                    Err(_) => continue,
                },
                _ => continue,
            }
        }

        tracing::warn!(endpoint = %self.id, channel = %id, "shared channel table full");
        Err(SlotError::TableFull {
            capacity: self.cfg.channel_slots,
        })
    }

    /// Ids of every channel created in this endpoint so far, by any process.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        (0..self.cfg.channel_slots)
            .filter_map(|idx| self.channel_at(idx).id())
            .collect()
    }

    /// Unmaps the endpoint and deletes its file. Every process that opens the
    /// path afterwards starts from an empty endpoint. Processes that still
    /// have the old file mapped keep sharing it with each other, but it can
    /// no longer be reached by path.
    pub fn remove(self) -> io::Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path)?;
        tracing::info!(path = %path.display(), "shared endpoint removed");
        Ok(())
    }
}

fn wait_until_ready(header: &EndpointHeader) -> io::Result<()> {
    for spins in 0..INIT_SPIN_LIMIT {
        if header.state.load(Ordering::Acquire) == STATE_READY {
            return Ok(());
        }
        if spins % 1024 == 1023 {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }
    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        "endpoint header was never initialised",
    ))
}

/// A bound channel inside a shared endpoint. Keeps the mapping alive.
#[derive(Clone)]
pub struct ShmChannel {
    endpoint: Arc<ShmEndpoint>,
    index: usize,
}

impl Deref for ShmChannel {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        self.endpoint.channel_at(self.index)
    }
}

impl ChannelSource for Arc<ShmEndpoint> {
    type Handle = ShmChannel;

    fn endpoint_id(&self) -> EndpointId {
        self.id
    }

    fn get_or_create(&self, id: ChannelId) -> SlotResult<ShmChannel> {
        let index = self.find_or_claim(id)?;
        Ok(ShmChannel {
            endpoint: Arc::clone(self),
            index,
        })
    }
}
