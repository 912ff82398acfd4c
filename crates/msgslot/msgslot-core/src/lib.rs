#![forbid(unsafe_code)]

pub mod buffer;
pub mod error;
pub mod ids;

pub use buffer::{BUF_LEN, MessageBuffer};
pub use error::{SlotError, SlotResult};
pub use ids::{ChannelId, EndpointId};
