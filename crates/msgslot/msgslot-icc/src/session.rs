//! Per-open session: one endpoint, at most one bound channel.

use crate::table::ChannelSource;
use msgslot_core::{BUF_LEN, ChannelId, EndpointId, SlotError, SlotResult};

/// A caller's view of one endpoint.
///
/// Starts unbound. [`bind`](Self::bind) attaches a channel; binding again
/// silently replaces the previous channel. Dropping the session (or calling
/// [`close`](Self::close)) never affects the endpoint or its channels.
pub struct Session<S: ChannelSource> {
    source: S,
    bound: Option<(ChannelId, S::Handle)>,
}

impl<S: ChannelSource> Session<S> {
    pub fn open(source: S) -> Self {
        tracing::trace!(endpoint = %source.endpoint_id(), "session opened");
        Self {
            source,
            bound: None,
        }
    }

    pub fn endpoint_id(&self) -> EndpointId {
        self.source.endpoint_id()
    }

    /// The bound channel id, `None` while unbound.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.bound.as_ref().map(|(id, _)| *id)
    }

    /// Binds the session to channel `raw`, creating the channel on first use.
    ///
    /// # Errors
    /// - `InvalidArgument` for channel id `0`; the previous binding is kept
    /// - whatever the channel source reports (`DataLoss`, `TableFull`)
    pub fn bind(&mut self, raw: u64) -> SlotResult<ChannelId> {
        let id = ChannelId::new(raw).inspect_err(|err| {
            tracing::debug!(endpoint = %self.endpoint_id(), %err, "bind rejected");
        })?;
        let channel = self.source.get_or_create(id)?;
        self.bound = Some((id, channel));
        Ok(id)
    }

    /// Writes `payload` to the bound channel, superseding any unread message.
    pub fn write(&self, payload: &[u8]) -> SlotResult<usize> {
        let (id, channel) = self.bound.as_ref().ok_or(SlotError::NotBound)?;
        channel.write(payload).inspect_err(|err| {
            tracing::debug!(
                endpoint = %self.endpoint_id(),
                channel = %id,
                len = payload.len(),
                %err,
                "write rejected"
            );
        })
    }

    /// Reads the current message into `buf`, using `buf.len()` as the
    /// requested length. Returns the message's length; the rest of the
    /// requested range receives the slot's zero padding.
    pub fn read(&self, buf: &mut [u8]) -> SlotResult<usize> {
        self.read_into(buf.len(), buf)
    }

    /// Like [`read`](Self::read) with an explicit requested length, for
    /// transports whose caller states a length separately from the buffer.
    pub fn read_into(&self, requested: usize, dst: &mut [u8]) -> SlotResult<usize> {
        let (id, channel) = self.bound.as_ref().ok_or(SlotError::NotBound)?;
        channel.read_into(requested, dst).inspect_err(|err| {
            tracing::debug!(
                endpoint = %self.endpoint_id(),
                channel = %id,
                requested,
                %err,
                "read rejected"
            );
        })
    }

    /// Reads into a fresh `BUF_LEN` buffer and returns just the payload.
    pub fn read_message(&self) -> SlotResult<Vec<u8>> {
        let mut buf = [0u8; BUF_LEN];
        let n = self.read(&mut buf)?;
        Ok(buf[..n].to_vec())
    }

    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use crate::registry::EndpointRegistry;
    use msgslot_core::{BUF_LEN, EndpointId, SlotError};

    #[test]
    fn unbound_session_is_not_bound() {
        let registry = EndpointRegistry::new();
        let session = registry.open(EndpointId(0));
        let mut buf = [0u8; BUF_LEN];

        assert_eq!(session.channel_id(), None);
        assert_eq!(session.write(b"x"), Err(SlotError::NotBound));
        assert_eq!(session.read(&mut buf), Err(SlotError::NotBound));
    }

    #[test]
    fn bind_zero_is_invalid_and_keeps_binding() {
        let registry = EndpointRegistry::new();
        let mut session = registry.open(EndpointId(0));
        session.bind(3).unwrap();

        assert!(matches!(session.bind(0), Err(SlotError::InvalidArgument(_))));
        assert_eq!(session.channel_id().map(|c| c.get()), Some(3));
    }

    #[test]
    fn hello_round_trip_between_sessions() {
        let registry = EndpointRegistry::new();
        let mut sender = registry.open(EndpointId(0));
        let mut reader = registry.open(EndpointId(0));
        sender.bind(5).unwrap();
        reader.bind(5).unwrap();

        assert_eq!(sender.write(b"hello"), Ok(5));
        sender.close();

        let mut buf = [0xAAu8; BUF_LEN];
        assert_eq!(reader.read(&mut buf), Ok(5));
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(buf[5..], [0u8; BUF_LEN - 5]);
    }

    #[test]
    fn fresh_channel_would_block() {
        let registry = EndpointRegistry::new();
        let mut session = registry.open(EndpointId(0));
        session.bind(7).unwrap();
        assert_eq!(session.read_message(), Err(SlotError::WouldBlock));
    }

    #[test]
    fn rebind_switches_channel_silently() {
        let registry = EndpointRegistry::new();
        let mut session = registry.open(EndpointId(0));
        session.bind(1).unwrap();
        session.write(b"one").unwrap();

        session.bind(2).unwrap();
        assert_eq!(session.read_message(), Err(SlotError::WouldBlock));
        session.write(b"two").unwrap();

        session.bind(1).unwrap();
        assert_eq!(session.read_message().unwrap(), b"one");
    }

    #[test]
    fn explicit_request_length_is_honoured() {
        let registry = EndpointRegistry::new();
        let mut session = registry.open(EndpointId(9));
        session.bind(1).unwrap();
        session.write(b"abcdef").unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(session.read_into(6, &mut buf), Ok(6));
        assert!(matches!(
            session.read_into(100, &mut buf),
            Err(SlotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn session_outliving_teardown_sees_data_loss() {
        let registry = EndpointRegistry::new();
        let mut session = registry.open(EndpointId(0));
        session.bind(1).unwrap();
        session.write(b"doomed").unwrap();

        registry.teardown();

        assert_eq!(session.read_message(), Err(SlotError::DataLoss));
        assert_eq!(session.write(b"again"), Err(SlotError::DataLoss));
        assert_eq!(session.bind(2), Err(SlotError::DataLoss));
    }
}
