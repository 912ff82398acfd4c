use anyhow::{Context, Result};
use clap::Parser;
use msgslot::{Target, init_tracing};
use msgslot_icc::BUF_LEN;
use std::io::Write;

/// Print the channel's current message to stdout and exit.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    target: Target,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.target.load_config()?;
    init_tracing(&cfg.log_level);

    let session = cli.target.bind(&cfg)?;
    let mut buf = [0u8; BUF_LEN];
    let len = session.read(&mut buf).context("read failed")?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&buf[..len])?;
    stdout.flush()?;
    Ok(())
}
