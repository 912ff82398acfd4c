//! Per-endpoint channel lookup.

use crate::channel::Channel;
use msgslot_core::{ChannelId, EndpointId, SlotError, SlotResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Anything a session can bind channels from.
///
/// Implemented by the in-process [`ChannelTable`] and by the memory-mapped
/// [`ShmEndpoint`](crate::ShmEndpoint), so sessions behave the same over
/// either.
pub trait ChannelSource {
    /// A shared handle to one channel; keeps it alive while bound.
    type Handle: Deref<Target = Channel>;

    fn endpoint_id(&self) -> EndpointId;

    /// Returns the channel for `id`, creating it on first use. Two callers
    /// racing on a new id get the same channel.
    fn get_or_create(&self, id: ChannelId) -> SlotResult<Self::Handle>;
}

/// Channel-id -> channel map for one in-process endpoint.
///
/// Channels are created lazily and never removed; the whole table is
/// drained at once when the registry tears the endpoint down.
#[derive(Debug)]
pub struct ChannelTable {
    endpoint: EndpointId,
    channels: Mutex<HashMap<ChannelId, Arc<Channel>>>,
    retired: AtomicBool,
}

/// What draining a table threw away.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub channels: usize,
    /// Channels that still held a message, read or not.
    pub with_message: usize,
}

impl ChannelTable {
    pub fn new(endpoint: EndpointId) -> Self {
        Self {
            endpoint,
            channels: Mutex::new(HashMap::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint
    }

    /// # Errors
    /// `DataLoss` once the table has been drained.
    pub fn get_or_create(&self, id: ChannelId) -> SlotResult<Arc<Channel>> {
        let mut channels = self.channels.lock();
        // Checked under the lock so a concurrent drain cannot miss an insert.
        if self.retired.load(Ordering::Acquire) {
            return Err(SlotError::DataLoss);
        }

        let channel = channels.entry(id).or_insert_with(|| {
            tracing::debug!(endpoint = %self.endpoint, channel = %id, "channel created");
            Arc::new(Channel::new(id))
        });
        Ok(Arc::clone(channel))
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Retires the table and every channel in it.
    pub(crate) fn drain(&self) -> DrainStats {
        let mut channels = self.channels.lock();
        self.retired.store(true, Ordering::Release);

        let mut stats = DrainStats::default();
        for (_, channel) in channels.drain() {
            stats.channels += 1;
            if channel.retire() {
                stats.with_message += 1;
            }
        }
        stats
    }
}

impl ChannelSource for Arc<ChannelTable> {
    type Handle = Arc<Channel>;

    fn endpoint_id(&self) -> EndpointId {
        self.endpoint
    }

    fn get_or_create(&self, id: ChannelId) -> SlotResult<Arc<Channel>> {
        ChannelTable::get_or_create(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(raw: u64) -> ChannelId {
        ChannelId::new(raw).unwrap()
    }

    #[test]
    fn same_id_same_channel() {
        let table = ChannelTable::new(EndpointId(0));
        let a = table.get_or_create(cid(4)).unwrap();
        let b = table.get_or_create(cid(4)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_ids_are_independent() {
        let table = ChannelTable::new(EndpointId(0));
        let a = table.get_or_create(cid(1)).unwrap();
        let b = table.get_or_create(cid(2)).unwrap();

        a.write(b"for a").unwrap();
        assert!(!b.has_message());
        b.write(b"for b").unwrap();
        assert_eq!(a.snapshot().payload(), b"for a");
        assert_eq!(b.snapshot().payload(), b"for b");
    }

    #[test]
    fn concurrent_first_bind_creates_one_channel() {
        let table = Arc::new(ChannelTable::new(EndpointId(3)));
        let handles: Vec<Arc<Channel>> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| table.get_or_create(cid(77)).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(table.len(), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn drain_counts_channels_holding_a_message() {
        let table = ChannelTable::new(EndpointId(0));
        table.get_or_create(cid(1)).unwrap().write(b"pending").unwrap();
        let idle = table.get_or_create(cid(2)).unwrap();

        let stats = table.drain();
        assert_eq!(
            stats,
            DrainStats {
                channels: 2,
                with_message: 1
            }
        );
        assert!(table.is_empty());
        assert!(idle.is_retired());
        assert_eq!(table.get_or_create(cid(1)).err(), Some(SlotError::DataLoss));
    }

    /// Reads do not consume, so a message that was read still counts.
    #[test]
    fn drain_counts_read_messages_too() {
        let table = ChannelTable::new(EndpointId(0));
        let channel = table.get_or_create(cid(4)).unwrap();
        channel.write(b"seen").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(channel.read_into(16, &mut buf), Ok(4));

        assert_eq!(table.drain().with_message, 1);
    }
}
