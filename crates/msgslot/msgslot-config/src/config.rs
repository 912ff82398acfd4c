use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest accepted `channel_slots`.
pub const MAX_CHANNEL_SLOTS: usize = 1 << 16;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SlotConfig {
    /// Directory holding one shared file per endpoint.
    #[serde(default = "defaults::device_dir")]
    pub device_dir: PathBuf,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Channel records per endpoint file. Power of two, at most
    /// [`MAX_CHANNEL_SLOTS`].
    #[serde(default = "defaults::channel_slots")]
    pub channel_slots: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("channel_slots must be a power of two no larger than {MAX_CHANNEL_SLOTS}, got {0}")]
    ChannelSlots(usize),
}

mod defaults {
    use std::path::PathBuf;

    pub fn device_dir() -> PathBuf {
        "/tmp/msgslot".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn channel_slots() -> usize {
        256
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            device_dir: defaults::device_dir(),
            log_level: defaults::log_level(),
            channel_slots: defaults::channel_slots(),
        }
    }
}

impl SlotConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: SlotConfig = toml::from_str(toml_str)?;
        if !config.channel_slots.is_power_of_two() || config.channel_slots > MAX_CHANNEL_SLOTS {
            return Err(ConfigError::ChannelSlots(config.channel_slots));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(SlotConfig::parse("").unwrap(), SlotConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let cfg = SlotConfig::parse(
            r#"
            device_dir = "/run/msgslot"
            log_level = "debug"
            channel_slots = 1024
            "#,
        )
        .unwrap();
        assert_eq!(cfg.device_dir, PathBuf::from("/run/msgslot"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.channel_slots, 1024);
    }

    #[test]
    fn odd_slot_count_is_rejected() {
        let err = SlotConfig::parse("channel_slots = 300").unwrap_err();
        assert!(matches!(err, ConfigError::ChannelSlots(300)));
    }

    #[test]
    fn huge_slot_count_is_rejected() {
        let err = SlotConfig::parse("channel_slots = 1152921504606846976").unwrap_err();
        assert!(matches!(err, ConfigError::ChannelSlots(n) if n == 1 << 60));

        let max = format!("channel_slots = {MAX_CHANNEL_SLOTS}");
        assert_eq!(SlotConfig::parse(&max).unwrap().channel_slots, MAX_CHANNEL_SLOTS);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SlotConfig::parse("capacity = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = SlotConfig::load("/nonexistent/msgslot.toml").unwrap_err();
        assert_eq!(err.to_string(), "failed to read '/nonexistent/msgslot.toml'");
    }
}
