// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The thread supervisor: wires the processor, scavenger, GC watcher,
// uptime ticker, telemetry listener and read loops together, runs until
// shutdown, and joins everything it started.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};

use crate::command::{CommandProcessor, Effects, DEFAULT_SCAVENGE_THRESHOLD};
use crate::context::BrokerContext;
use crate::fifo::FifoPath;
use crate::gc::{GcWatcher, DEFAULT_GC_EXE};
use crate::http::{self, ServerStatus};
use crate::message::Message;
use crate::quit::{self, notify_quit_thread, QuitTargets, SIG_SELF_QUIT};
use crate::read_loop::read_loop;
use crate::recorder::{Player, Recorder};
use crate::scavenger::Scavenger;
use crate::uptime::uptime;

/// Everything the command line can configure.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Append every received record to this file.
    pub record_path: Option<PathBuf>,
    /// Replay records from this file instead of spawning readers.
    pub playback_path: Option<PathBuf>,
    /// Override the platform-default FIFO path.
    pub pipe_path: Option<PathBuf>,
    /// Number of pipe-reading threads.
    pub num_read_threads: u32,
    /// Telemetry port; 0 disables the listener.
    pub http_port: u16,
    /// Print the bound telemetry port on stdout once it is up.
    pub announce_http_port: bool,
    /// Partial-command retention threshold.
    pub scavenge_time: Duration,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            record_path: None,
            playback_path: None,
            pipe_path: None,
            num_read_threads: 2,
            http_port: 8080,
            announce_http_port: false,
            scavenge_time: DEFAULT_SCAVENGE_THRESHOLD,
        }
    }
}

/// Production wiring of the dispatcher's capability set.
struct ProductionEffects {
    gc: Arc<GcWatcher>,
}

impl Effects for ProductionEffects {
    fn start_gc(&self, path: &str) {
        self.gc.start_vacuum(path);
    }

    fn begin_shutdown(&self) {
        notify_quit_thread();
    }

    fn wake_reader(&self, fifo: &FifoPath) -> io::Result<()> {
        // The content is irrelevant: the reader wakes on the data's
        // presence, sees `done`, and exits.
        let pipe = fifo.open_client()?;
        pipe.write_message(&Message::empty())?;
        Ok(())
    }

    fn echo(&self, path: &str) {
        println!("ECHO:{path}");
    }
}

fn spawn_worker<F>(name: &str, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(f)
}

/// Run the broker until shutdown; returns the process exit code.
pub fn run_broker(opt: &BrokerOptions) -> io::Result<i32> {
    info!("broker starting");

    // Fatal startup work happens before any worker thread exists.
    let record_file = match &opt.record_path {
        Some(path) => Some(Arc::new(Recorder::create(path)?)),
        None => None,
    };
    let playback_file = match &opt.playback_path {
        Some(path) => Some(Player::open(path)?),
        None => None,
    };

    info!("opening pipe");
    let fifo = FifoPath::new(opt.pipe_path.as_deref());

    let ctx = BrokerContext::new();
    let uptime_done = Arc::new(AtomicBool::new(false));
    let gc = Arc::new(GcWatcher::new(DEFAULT_GC_EXE));
    let http_status =
        (opt.http_port != 0).then(|| Arc::new(ServerStatus::new(opt.http_port)));

    let cp = Arc::new(CommandProcessor::new(
        Arc::clone(&ctx),
        Box::new(ProductionEffects {
            gc: Arc::clone(&gc),
        }),
        opt.num_read_threads,
        opt.scavenge_time,
    ));
    let scav = Arc::new(Scavenger::new(Arc::clone(&ctx), Arc::downgrade(&cp)));

    let quit = quit::create_quit_thread(QuitTargets {
        ctx: Arc::clone(&ctx),
        cp: Arc::downgrade(&cp),
        scav: Arc::downgrade(&scav),
        gc: Arc::downgrade(&gc),
        num_read_threads: opt.num_read_threads,
        http_status: http_status.clone(),
        uptime_done: Arc::clone(&uptime_done),
    })?;

    info!("starting threads");
    let mut workers = Vec::new();

    workers.push(spawn_worker("command", {
        let cp = Arc::clone(&cp);
        let fifo = fifo.clone();
        move || cp.thread_entry(&fifo)
    })?);

    workers.push(spawn_worker("scavenger", {
        let scav = Arc::clone(&scav);
        move || scav.thread_entry()
    })?);

    workers.push(spawn_worker("gcwatch", {
        let gc = Arc::clone(&gc);
        move || gc.thread_entry()
    })?);

    workers.push(spawn_worker("uptime", {
        let ctx = Arc::clone(&ctx);
        let done = Arc::clone(&uptime_done);
        move || uptime(&ctx, &done)
    })?);

    if let Some(status) = &http_status {
        let status = Arc::clone(status);
        let server_ctx = Arc::clone(&ctx);
        let announce = opt.announce_http_port;
        workers.push(spawn_worker("http", move || {
            let result = http::server(&status, &server_ctx, |port| {
                if announce {
                    println!("HTTP listening on port {port}");
                }
            });
            if let Err(err) = result {
                error!("telemetry server failed: {err}");
            }
        })?);
    }

    if let Some(player) = playback_file {
        // Deterministic replay: feed the processor directly, then shut
        // down. No readers are spawned in this mode.
        loop {
            match player.read(&ctx.pool) {
                Ok(Some(msg)) => cp.push_command(msg, record_file.as_deref()),
                Ok(None) => break,
                Err(err) => {
                    error!("playback stopped: {err}");
                    break;
                }
            }
        }
        quit::shutdown(
            &ctx,
            Some(&*cp),
            Some(&*scav),
            Some(&*gc),
            SIG_SELF_QUIT,
            0,
            http_status.as_deref(),
            &uptime_done,
        );
    } else {
        for n in 0..opt.num_read_threads {
            let cp = Arc::clone(&cp);
            let fifo = fifo.clone();
            let record_file = record_file.clone();
            workers.push(spawn_worker(&format!("read{n}"), move || {
                read_loop(&fifo, record_file.as_deref(), &cp);
            })?);
        }
    }

    info!("waiting");
    for worker in workers {
        if worker.join().is_err() {
            error!("worker thread panicked");
            ctx.set_exit_code(1);
        }
    }

    info!("worker threads done: stopping quit thread");
    notify_quit_thread();
    if quit.join().is_err() {
        error!("quit thread panicked");
        ctx.set_exit_code(1);
    }

    info!("exiting");
    Ok(ctx.exit_code())
}
