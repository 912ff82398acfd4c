//! Process-wide endpoint registry.
//!
//! The registry is an ordinary value: construct one, share it by `Arc`, and
//! tear it down (explicitly or by dropping it) when the service stops.

use crate::session::Session;
use crate::table::ChannelTable;
use msgslot_core::EndpointId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Summary of a registry teardown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub endpoints: usize,
    pub channels: usize,
    /// Channels that still held a message, read or not, when dropped.
    pub with_message: usize,
}

/// Endpoint-id -> channel table map.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: Mutex<HashMap<EndpointId, Arc<ChannelTable>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the endpoint's channel table, creating it on first reference.
    /// Entries are only ever removed by [`teardown`](Self::teardown).
    pub fn get_or_create(&self, id: EndpointId) -> Arc<ChannelTable> {
        let mut endpoints = self.endpoints.lock();
        let table = endpoints.entry(id).or_insert_with(|| {
            tracing::info!(endpoint = %id, "endpoint created");
            Arc::new(ChannelTable::new(id))
        });
        Arc::clone(table)
    }

    /// Opens an unbound session on endpoint `id`.
    pub fn open(&self, id: EndpointId) -> Session<Arc<ChannelTable>> {
        Session::open(self.get_or_create(id))
    }

    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }

    /// Discards every endpoint and every channel under it.
    ///
    /// Stored messages are lost. Sessions that still hold a channel or table
    /// from before the teardown get `SlotError::DataLoss` from then on. The
    /// registry itself stays usable and starts again from empty.
    pub fn teardown(&self) -> TeardownReport {
        let drained: Vec<_> = self.endpoints.lock().drain().collect();

        let mut report = TeardownReport {
            endpoints: drained.len(),
            ..TeardownReport::default()
        };
        for (id, table) in drained {
            let stats = table.drain();
            tracing::debug!(
                endpoint = %id,
                channels = stats.channels,
                with_message = stats.with_message,
                "endpoint torn down"
            );
            report.channels += stats.channels;
            report.with_message += stats.with_message;
        }

        if report.with_message > 0 {
            tracing::warn!(
                channels = report.with_message,
                "teardown dropped channels still holding a message"
            );
        }
        tracing::info!(
            endpoints = report.endpoints,
            channels = report.channels,
            "registry torn down"
        );
        report
    }
}

impl Drop for EndpointRegistry {
    fn drop(&mut self) {
        if !self.endpoints.get_mut().is_empty() {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgslot_core::ChannelId;

    #[test]
    fn same_endpoint_same_table() {
        let registry = EndpointRegistry::new();
        let a = registry.get_or_create(EndpointId(0));
        let b = registry.get_or_create(EndpointId(0));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_channel_id_differs_across_endpoints() {
        let registry = EndpointRegistry::new();
        let id = ChannelId::new(5).unwrap();
        let a = registry.get_or_create(EndpointId(0)).get_or_create(id).unwrap();
        let b = registry.get_or_create(EndpointId(1)).get_or_create(id).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        a.write(b"zero").unwrap();
        assert!(!b.has_message());
    }

    #[test]
    fn concurrent_first_open_creates_one_table() {
        let registry = EndpointRegistry::new();
        let tables: Vec<_> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.get_or_create(EndpointId(42))))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert_eq!(registry.len(), 1);
        assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn teardown_reports_and_resets() {
        let registry = EndpointRegistry::new();
        let id = ChannelId::new(1).unwrap();
        registry
            .get_or_create(EndpointId(0))
            .get_or_create(id)
            .unwrap()
            .write(b"lost")
            .unwrap();
        registry
            .get_or_create(EndpointId(1))
            .get_or_create(id)
            .unwrap();

        let report = registry.teardown();
        assert_eq!(
            report,
            TeardownReport {
                endpoints: 2,
                channels: 2,
                with_message: 1
            }
        );
        assert!(registry.is_empty());

        // A fresh endpoint starts empty.
        let fresh = registry.get_or_create(EndpointId(0)).get_or_create(id).unwrap();
        assert!(!fresh.has_message());
    }
}
