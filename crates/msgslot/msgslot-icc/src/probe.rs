//! Table geometry and open-addressing arithmetic for shared endpoints.

/// Geometry of a shared channel table.
///
/// The slot count must always be a power of 2, so a probe position wraps with
/// a bitmask instead of a modulo.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Number of channel records. Must be a power of 2.
    pub channel_slots: usize,
}

impl TableConfig {
    pub const DEFAULT_SLOTS: usize = 256;

    /// # Panics
    /// Panics if `channel_slots` is not a power of 2.
    ///
    /// # Example
    /// ```
    /// use msgslot_icc::TableConfig;
    /// let cfg = TableConfig::new(64);
    /// assert_eq!(cfg.mask(), 63);
    /// ```
    pub fn new(channel_slots: usize) -> Self {
        assert!(channel_slots.is_power_of_two(), "Channel slots must be power of 2");
        Self { channel_slots }
    }

    #[inline(always)]
    pub fn mask(&self) -> u64 {
        (self.channel_slots as u64) - 1
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLOTS)
    }
}

/// Scrambles a channel id (splitmix64 finalizer). Callers tend to pick small
/// consecutive ids, which would otherwise pile up in adjacent records.
#[inline(always)]
fn mix(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Record index visited on the `attempt`-th probe for `channel_id`.
///
/// Linear probing from a hashed home slot: `attempt = 0..capacity` visits
/// every record exactly once.
#[inline(always)]
pub fn probe_index(channel_id: u64, attempt: u64, mask: u64) -> usize {
    (mix(channel_id).wrapping_add(attempt) & mask) as usize
}
