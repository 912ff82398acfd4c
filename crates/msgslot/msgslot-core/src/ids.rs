use crate::error::SlotError;
use std::fmt;
use std::num::NonZeroU64;

// EndpointId names one device instance. It is assigned by whoever hosts the
// endpoints (a registry, a device directory) and is stable for that host.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-chosen channel identifier, scoped to one endpoint.
///
/// Channel `0` is reserved to mean "unbound" and can never be constructed,
/// so an unbound session is simply `Option::<ChannelId>::None`. The niche
/// also keeps `Option<ChannelId>` the same size as a `u64`.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(NonZeroU64);

impl ChannelId {
    /// Validates a raw channel id as received from a caller.
    ///
    /// # Errors
    /// `SlotError::InvalidArgument` for the reserved id `0`.
    pub fn new(raw: u64) -> Result<Self, SlotError> {
        NonZeroU64::new(raw)
            .map(Self)
            .ok_or(SlotError::InvalidArgument("channel id 0 is reserved"))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
