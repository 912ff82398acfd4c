pub type SlotResult<T> = Result<T, SlotError>;

/// Every way a slot operation can be refused.
///
/// None of these are fatal: the operation had no effect and the caller may
/// re-attempt it. Nothing in the engine retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("no message has been written to this channel yet")]
    WouldBlock,

    #[error("a {needed}-byte message does not fit in a {available}-byte read")]
    InsufficientSpace { needed: usize, available: usize },

    #[error("read of {requested} bytes exceeds the {capacity}-byte slot")]
    MessageTooLarge { requested: usize, capacity: usize },

    #[error("no channel is bound to this session")]
    NotBound,

    #[error("endpoint was torn down, its messages were discarded")]
    DataLoss,

    #[error("channel table is full ({capacity} channels)")]
    TableFull { capacity: usize },

    /// A live writer held the channel for longer than a write can take.
    #[error("channel is held by another writer (pid {holder})")]
    Busy { holder: u32 },
}

impl SlotError {
    /// The errno a character-device style transport would hand back for this
    /// error, matching the status codes of the classic message-slot driver.
    pub fn errno(&self) -> i32 {
        match self {
            SlotError::InvalidArgument(_) | SlotError::NotBound => libc::EINVAL,
            SlotError::WouldBlock => libc::EWOULDBLOCK,
            SlotError::InsufficientSpace { .. } => libc::ENOSPC,
            SlotError::MessageTooLarge { .. } => libc::EMSGSIZE,
            SlotError::DataLoss => libc::ENODEV,
            SlotError::TableFull { .. } => libc::ENOMEM,
            SlotError::Busy { .. } => libc::EBUSY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BUF_LEN;

    #[test]
    fn errno_follows_device_conventions() {
        assert_eq!(SlotError::NotBound.errno(), libc::EINVAL);
        assert_eq!(SlotError::WouldBlock.errno(), libc::EAGAIN);
        assert_eq!(
            SlotError::InsufficientSpace {
                needed: 5,
                available: 4
            }
            .errno(),
            libc::ENOSPC
        );
        let too_large = SlotError::MessageTooLarge {
            requested: 129,
            capacity: BUF_LEN,
        };
        assert_eq!(too_large.errno(), libc::EMSGSIZE);
        assert_eq!(SlotError::Busy { holder: 7 }.errno(), libc::EBUSY);
    }

    #[test]
    fn messages_name_the_sizes() {
        let err = SlotError::MessageTooLarge {
            requested: 200,
            capacity: BUF_LEN,
        };
        assert_eq!(err.to_string(), "read of 200 bytes exceeds the 128-byte slot");
    }
}
