// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The broker daemon. Parses the switch surface, initializes logging, and
// hands over to the supervisor; the exit code is whatever the shutdown
// controller latched.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use libbroker::daemon::{run_broker, BrokerOptions};

#[derive(Parser)]
#[command(name = "brokerd")]
#[command(version, about = "Message broker for the persistent-store toolchain")]
struct Cli {
    /// Record received messages in the named output file
    #[arg(long, short = 'r')]
    record: Option<PathBuf>,

    /// Play back messages from the named file (no reader threads)
    #[arg(long, short = 'p')]
    playback: Option<PathBuf>,

    /// Override the path of the FIFO from which commands will be read
    #[arg(long)]
    pipe_path: Option<PathBuf>,

    /// The number of pipe reading threads
    #[arg(long, default_value_t = 2)]
    read_threads: u32,

    /// The port on which to listen for HTTP connections (0 to disable)
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Print the chosen HTTP port on stdout once the server is up
    #[arg(long, default_value_t = false)]
    announce_http_port: bool,

    /// The time in seconds that a partial message may sit idle before the
    /// scavenger removes it
    #[arg(long, default_value_t = 4 * 60 * 60)]
    scavenge_time: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = BrokerOptions {
        record_path: cli.record,
        playback_path: cli.playback,
        pipe_path: cli.pipe_path,
        num_read_threads: cli.read_threads,
        http_port: cli.http_port,
        announce_http_port: cli.announce_http_port,
        scavenge_time: Duration::from_secs(cli.scavenge_time),
    };

    let exit_code = run_broker(&options)?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
