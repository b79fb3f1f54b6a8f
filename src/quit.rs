// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shutdown orchestration. A handled OS signal (or the SUICIDE command, via
// the same latch) wakes the dedicated quit thread, which performs the one
// and only teardown sequence: stop the GC watcher, nudge the scavenger,
// wake each reader with `_QUIT`, stop the command loop with `_CQUIT`, stop
// the HTTP listener, and flag the uptime ticker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use log::info;

use crate::command::{
    CommandProcessor, COMMAND_LOOP_QUIT_COMMAND, READ_LOOP_QUIT_COMMAND,
};
use crate::context::BrokerContext;
use crate::gc::GcWatcher;
use crate::http::ServerStatus;
use crate::message::{Message, PAYLOAD_CHARS};
use crate::platform::{self, SignalLatch};
use crate::scavenger::Scavenger;

/// Synthetic "signal" latched when shutdown is initiated from inside the
/// process rather than by the OS.
pub const SIG_SELF_QUIT: i32 = -1;

/// Wake the quit thread as if a signal had arrived. Shared by the SUICIDE
/// handler and the supervisor's final teardown.
pub fn notify_quit_thread() {
    platform::notify_signal_latch(SIG_SELF_QUIT);
}

/// Push a single-record internal command onto the processor's queue.
fn push(cp: &CommandProcessor, message: &str) {
    static MID: AtomicU32 = AtomicU32::new(0);

    info!("push command {message:?}");
    debug_assert!(message.len() <= PAYLOAD_CHARS);
    let msg = Message::new(MID.fetch_add(1, Ordering::Relaxed), 0, 1, message)
        .expect("a one-part message is always well-formed");
    cp.push_command(Box::new(msg), None);
}

/// Perform the shutdown sequence.
///
/// Idempotent: the sequence runs for exactly the one caller that flips the
/// context's `done` flag; every other call is a no-op. The processor,
/// scavenger and GC watcher may already be gone, which is tolerated.
#[allow(clippy::too_many_arguments)]
pub fn shutdown(
    ctx: &BrokerContext,
    cp: Option<&CommandProcessor>,
    scav: Option<&Scavenger>,
    gc: Option<&GcWatcher>,
    signum: i32,
    num_read_threads: u32,
    http_status: Option<&ServerStatus>,
    uptime_done: &AtomicBool,
) {
    if !ctx.begin_shutdown() {
        return;
    }
    eprintln!("broker is exiting.");
    info!("performing shutdown (signal {})", signal_name(signum));

    if let Some(gc) = gc {
        gc.stop();
    }
    if let Some(scav) = scav {
        scav.shutdown();
    }
    if let Some(cp) = cp {
        // Ask the read-loop threads to quit, then the command loop itself.
        for _ in 0..num_read_threads {
            push(cp, READ_LOOP_QUIT_COMMAND);
        }
        push(cp, COMMAND_LOOP_QUIT_COMMAND);
    }
    if let Some(http) = http_status {
        http.quit();
    }
    uptime_done.store(true, Ordering::Release);

    info!("shutdown requests complete");
}

/// Everything the quit thread needs to tear the broker down. All handles
/// are non-owning so the quit thread cannot keep workers alive.
pub struct QuitTargets {
    pub ctx: Arc<BrokerContext>,
    pub cp: Weak<CommandProcessor>,
    pub scav: Weak<Scavenger>,
    pub gc: Weak<GcWatcher>,
    pub num_read_threads: u32,
    pub http_status: Option<Arc<ServerStatus>>,
    pub uptime_done: Arc<AtomicBool>,
}

fn quit_thread(latch: SignalLatch, targets: QuitTargets) {
    // Blocks until a signal is latched — by the OS handler, the SUICIDE
    // command, or the supervisor's final notify.
    let signum = latch.wait();
    info!("signal received: shutting down. signal: {}", signal_name(signum));
    if signum != SIG_SELF_QUIT {
        targets.ctx.set_exit_code(signum);
    }

    let cp = targets.cp.upgrade();
    if let Some(cp) = &cp {
        // Whatever is queued will never be processed; drop it so the
        // internal commands go to the front.
        cp.clear_queue();
    }
    let scav = targets.scav.upgrade();
    let gc = targets.gc.upgrade();

    shutdown(
        &targets.ctx,
        cp.as_deref(),
        scav.as_deref(),
        gc.as_deref(),
        signum,
        targets.num_read_threads,
        targets.http_status.as_deref(),
        &targets.uptime_done,
    );
    info!("quit thread exiting");
}

/// Install the signal handlers and spawn the quit thread.
pub fn create_quit_thread(targets: QuitTargets) -> std::io::Result<JoinHandle<()>> {
    let latch = SignalLatch::create()?;
    platform::register_quit_signals()?;
    thread::Builder::new()
        .name("quit".to_string())
        .spawn(move || quit_thread(latch, targets))
}

#[cfg(unix)]
fn signal_name(signum: i32) -> String {
    match signum {
        SIG_SELF_QUIT => "self-quit".to_string(),
        libc::SIGINT => "SIGINT".to_string(),
        libc::SIGTERM => "SIGTERM".to_string(),
        _ => format!("#{signum}"),
    }
}

#[cfg(windows)]
fn signal_name(signum: i32) -> String {
    match signum {
        SIG_SELF_QUIT => "self-quit".to_string(),
        2 => "SIGINT".to_string(),
        15 => "SIGTERM".to_string(),
        _ => format!("#{signum}"),
    }
}
