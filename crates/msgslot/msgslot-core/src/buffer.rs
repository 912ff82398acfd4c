use crate::error::{SlotError, SlotResult};
use std::fmt;

/// Capacity of a single message slot, in bytes.
pub const BUF_LEN: usize = 128;

/// One message, stored inline and zero-padded to `BUF_LEN`.
///
/// POD with no pointers, so it can be copied bitwise out of a seqlock slot
/// and lives unchanged inside a memory-mapped endpoint file. An all-zero
/// value is the empty buffer.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MessageBuffer {
    len: u32,
    bytes: [u8; BUF_LEN],
}

impl MessageBuffer {
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; BUF_LEN],
    };

    /// Builds a buffer holding `payload`, zero-filled past its end.
    ///
    /// # Errors
    /// `SlotError::InvalidArgument` when `payload` is empty or longer than
    /// `BUF_LEN`.
    pub fn from_payload(payload: &[u8]) -> SlotResult<Self> {
        if payload.is_empty() {
            return Err(SlotError::InvalidArgument("empty message"));
        }
        if payload.len() > BUF_LEN {
            return Err(SlotError::InvalidArgument("message longer than slot capacity"));
        }
        let mut buf = Self::EMPTY;
        buf.bytes[..payload.len()].copy_from_slice(payload);
        buf.len = payload.len() as u32;
        Ok(buf)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The message itself, without padding.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// The whole slot, padding included.
    #[inline]
    pub fn padded(&self) -> &[u8; BUF_LEN] {
        &self.bytes
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("len", &self.len)
            .field("payload", &String::from_utf8_lossy(self.payload()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn layout_is_stable() {
        assert_eq!(size_of::<MessageBuffer>(), 4 + BUF_LEN, "MessageBuffer layout changed");
        assert_eq!(align_of::<MessageBuffer>(), 4);
    }

    #[test]
    fn payload_is_zero_padded() {
        let buf = MessageBuffer::from_payload(b"hello").unwrap();
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.payload(), b"hello");
        assert!(buf.padded()[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn full_capacity_message_is_accepted() {
        let msg = [0xAB; BUF_LEN];
        let buf = MessageBuffer::from_payload(&msg).unwrap();
        assert_eq!(buf.len(), BUF_LEN);
        assert_eq!(buf.padded(), &msg);
    }

    #[test]
    fn empty_and_oversized_payloads_are_rejected() {
        assert!(matches!(
            MessageBuffer::from_payload(b""),
            Err(SlotError::InvalidArgument(_))
        ));
        assert!(matches!(
            MessageBuffer::from_payload(&[1; BUF_LEN + 1]),
            Err(SlotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn default_is_empty() {
        let buf = MessageBuffer::default();
        assert!(buf.is_empty());
        assert!(buf.payload().is_empty());
    }
}
