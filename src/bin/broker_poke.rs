// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Submit one command to a running broker. Useful for poking the daemon by
// hand: `broker_poke ECHO "hello world"`, `broker_poke GC /path/to/store`,
// or `broker_poke SUICIDE` to shut it down.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use libbroker::fifo::FifoPath;
use libbroker::send_message::{send_message, PipeWriter};

#[derive(Parser)]
#[command(name = "broker_poke")]
#[command(version, about = "Send a single command to the broker")]
struct Cli {
    /// Override the path of the broker's FIFO
    #[arg(long)]
    pipe_path: Option<PathBuf>,

    /// The command verb (e.g. ECHO, GC, NOP, SUICIDE)
    verb: String,

    /// The command payload; typically a store path
    #[arg(default_value = "")]
    path: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let fifo = FifoPath::new(cli.pipe_path.as_deref());
    let pipe = fifo
        .open_client()
        .with_context(|| format!("cannot open broker pipe {}", fifo.path().display()))?;

    let mut writer = PipeWriter::new(pipe);
    send_message(&mut writer, &cli.verb, &cli.path).context("sending command")?;
    Ok(())
}
