mod channel;
mod probe;
mod registry;
mod seqlock;
mod session;
mod shm;
pub mod shm_layout;
mod table;

pub use channel::Channel;
pub use msgslot_core::{BUF_LEN, ChannelId, EndpointId, MessageBuffer, SlotError, SlotResult};
pub use probe::TableConfig;
pub use registry::{EndpointRegistry, TeardownReport};
pub use session::Session;
pub use shm::{ShmChannel, ShmEndpoint};
pub use table::{ChannelSource, ChannelTable, DrainStats};
