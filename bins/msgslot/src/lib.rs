//! Shared plumbing for the `message_sender` / `message_reader` binaries.

use anyhow::{Context, Result};
use clap::Args;
use msgslot_config::SlotConfig;
use msgslot_icc::{EndpointId, Session, ShmEndpoint, TableConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Where to find the endpoint and which channel to use.
#[derive(Args, Debug)]
pub struct Target {
    /// Endpoint (device instance) id.
    pub endpoint: u32,
    /// Channel id; 0 is reserved and rejected.
    pub channel: u64,
    /// TOML config file; defaults apply when omitted.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Target {
    pub fn load_config(&self) -> Result<SlotConfig> {
        match &self.config {
            Some(path) => SlotConfig::load(path.display().to_string())
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(SlotConfig::default()),
        }
    }

    /// Opens the endpoint file and binds a session to the channel.
    pub fn bind(&self, cfg: &SlotConfig) -> Result<Session<Arc<ShmEndpoint>>> {
        let id = EndpointId(self.endpoint);
        let endpoint = ShmEndpoint::open_in(&cfg.device_dir, id, TableConfig::new(cfg.channel_slots))
            .with_context(|| format!("can't open endpoint {id} in {}", cfg.device_dir.display()))?;

        let mut session = Session::open(Arc::new(endpoint));
        session
            .bind(self.channel)
            .with_context(|| format!("can't bind channel {}", self.channel))?;
        Ok(session)
    }
}

/// Logs go to stderr so stdout carries only message bytes. `RUST_LOG`
/// overrides the configured level.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
