// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// One reader thread: draw a buffer from the pool, fill it with a record
// from the pipe, move it onto the command queue. Several readers may run
// against the same pipe; whichever wakes first takes the data.

use log::{error, info, warn};

use crate::command::CommandProcessor;
use crate::fifo::FifoPath;
use crate::message::MESSAGE_SIZE;
use crate::quit::notify_quit_thread;
use crate::recorder::Recorder;

/// Idle wake interval: even with no client traffic a reader re-checks the
/// `done` flag this often.
pub const READ_TIMEOUT_SECS: u32 = 60;

/// Run one read loop until shutdown. A transport error is fatal for the
/// whole broker: the exit code is set and the quit thread notified.
pub fn read_loop(fifo: &FifoPath, record_file: Option<&Recorder>, cp: &CommandProcessor) {
    match run(fifo, record_file, cp) {
        Ok(()) => {}
        Err(err) => {
            error!("read loop error: {err}");
            cp.context().set_exit_code(1);
            notify_quit_thread();
        }
    }
    info!("exiting read loop");
}

fn run(
    fifo: &FifoPath,
    record_file: Option<&Recorder>,
    cp: &CommandProcessor,
) -> std::io::Result<()> {
    let ctx = cp.context();
    info!("listening to FIFO {}", fifo.path().display());
    let pipe = fifo.open_server()?;

    let mut readbuf = ctx.pool.get();
    let mut bytes = [0u8; MESSAGE_SIZE];

    loop {
        // Drain whatever is in the pipe right now.
        loop {
            let n = pipe.read_bytes(&mut bytes)?;
            if n == 0 {
                break;
            }
            if ctx.is_done() {
                return Ok(());
            }
            if n != MESSAGE_SIZE {
                // A framing error from a confused client; drop it and
                // keep serving everyone else.
                error!("partial record received, length {n}");
                continue;
            }
            readbuf.decode_from(&bytes);
            cp.push_command(readbuf, record_file);
            readbuf = ctx.pool.get();
        }

        if ctx.is_done() {
            return Ok(());
        }

        // Sleep until data arrives, or time out so `done` is observed even
        // on a silent pipe. Another reader may win the race to the data, in
        // which case the next read simply reports would-block.
        if !pipe.wait_readable(READ_TIMEOUT_SECS)? {
            warn!("no data within timeout");
        }
    }
}
