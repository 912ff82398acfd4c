use anyhow::{Context, Result};
use clap::Parser;
use msgslot::{Target, init_tracing};
use std::ffi::OsString;

/// Write one message to a channel and exit.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    target: Target,
    /// Message, 1 to 128 bytes. Sent byte for byte, UTF-8 or not.
    message: OsString,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.target.load_config()?;
    init_tracing(&cfg.log_level);

    let session = cli.target.bind(&cfg)?;
    let written = session
        .write(cli.message.as_encoded_bytes())
        .context("write failed")?;

    tracing::debug!(
        endpoint = cli.target.endpoint,
        channel = cli.target.channel,
        written,
        "message sent"
    );
    Ok(())
}
