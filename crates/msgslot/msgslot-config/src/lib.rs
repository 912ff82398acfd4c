mod config;

pub use config::{ConfigError, MAX_CHANNEL_SLOTS, SlotConfig};
