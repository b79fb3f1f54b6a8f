// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The command processor: pops records off the command queue, reassembles
// them into whole commands, and dispatches each through a sorted verb table.
// External side effects (starting a GC, shutting the broker down, waking a
// reader, echoing) go through the Effects trait so tests can wire a spy.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use log::{error, info};

use crate::context::BrokerContext;
use crate::fifo::FifoPath;
use crate::message::{Message, MessagePtr};
use crate::parser::{self, BrokerCommand, PartialCmds};
use crate::queue::MessageQueue;
use crate::recorder::Recorder;

/// Internal verb: asks one read loop to wake up and observe `done`.
pub const READ_LOOP_QUIT_COMMAND: &str = "_QUIT";

/// Internal verb: asks the command loop itself to exit.
pub const COMMAND_LOOP_QUIT_COMMAND: &str = "_CQUIT";

/// How long a partial command may sit idle before the scavenger evicts it.
pub const DEFAULT_SCAVENGE_THRESHOLD: Duration = Duration::from_secs(4 * 60 * 60);

/// External capabilities the dispatcher needs. Production wires the real
/// implementations; tests wire a spy.
pub trait Effects: Send + Sync {
    /// Start a garbage-collection process for `path`.
    fn start_gc(&self, path: &str);

    /// Begin broker shutdown. Must share the signal-initiated path.
    fn begin_shutdown(&self);

    /// Wake one reader blocked on the pipe by writing a throwaway record.
    fn wake_reader(&self, fifo: &FifoPath) -> io::Result<()>;

    /// Deliver ECHO output.
    fn echo(&self, path: &str);
}

type Handler = fn(&CommandProcessor, &FifoPath, &BrokerCommand) -> io::Result<()>;

/// Lexically sorted verb table; lookup is a binary search. Two internal
/// verbs sort after the public ones because `_` follows the uppercase
/// letters in ASCII.
static COMMANDS: [(&str, Handler); 6] = [
    ("ECHO", CommandProcessor::echo),
    ("GC", CommandProcessor::gc),
    ("NOP", CommandProcessor::nop),
    ("SUICIDE", CommandProcessor::suicide),
    (COMMAND_LOOP_QUIT_COMMAND, CommandProcessor::cquit),
    (READ_LOOP_QUIT_COMMAND, CommandProcessor::quit),
];

/// Verbs in dispatch-table order.
pub fn dispatch_verbs() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|entry| entry.0)
}

pub struct CommandProcessor {
    ctx: Arc<BrokerContext>,
    effects: Box<dyn Effects>,
    /// Partially reassembled commands. The lock is released before any
    /// handler runs so a handler may push further commands without
    /// deadlocking.
    cmds: Mutex<PartialCmds>,
    messages: MessageQueue<MessagePtr>,
    commits: AtomicU64,
    commands_done: AtomicBool,
    delete_threshold: Duration,
    num_read_threads: u32,
}

impl CommandProcessor {
    pub fn new(
        ctx: Arc<BrokerContext>,
        effects: Box<dyn Effects>,
        num_read_threads: u32,
        delete_threshold: Duration,
    ) -> Self {
        debug_assert!(
            COMMANDS.windows(2).all(|pair| pair[0].0 < pair[1].0),
            "dispatch table must be sorted"
        );
        Self {
            ctx,
            effects,
            cmds: Mutex::new(PartialCmds::new()),
            messages: MessageQueue::new(),
            commits: AtomicU64::new(0),
            commands_done: AtomicBool::new(false),
            delete_threshold,
            num_read_threads,
        }
    }

    pub fn context(&self) -> &Arc<BrokerContext> {
        &self.ctx
    }

    pub fn num_read_threads(&self) -> u32 {
        self.num_read_threads
    }

    /// Number of GC commands processed so far.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    /// Number of commands awaiting their remaining records.
    pub fn pending_partials(&self) -> usize {
        self.cmds.lock().unwrap().len()
    }

    pub fn commands_done(&self) -> bool {
        self.commands_done.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Queue side
    // -----------------------------------------------------------------------

    /// Append a record to the command queue, mirroring it to the record
    /// file when one is open.
    pub fn push_command(&self, msg: MessagePtr, record_file: Option<&Recorder>) {
        if let Some(rec) = record_file {
            if let Err(err) = rec.record(&msg) {
                error!("record file write failed: {err}");
            }
        }
        self.messages.push(msg);
    }

    /// Drop everything queued. Called by the quit thread before it injects
    /// the shutdown verbs.
    pub fn clear_queue(&self) {
        self.messages.clear();
    }

    pub fn queued(&self) -> usize {
        self.messages.len()
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    /// Run the command loop until `_CQUIT` arrives. Handler failures are
    /// logged and the loop continues; nothing else stops it.
    pub fn thread_entry(&self, fifo: &FifoPath) {
        info!("waiting for commands");
        while !self.commands_done() {
            let msg = self.messages.pop();
            let outcome = catch_unwind(AssertUnwindSafe(|| self.process_command(fifo, &msg)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("command failed: {err}"),
                Err(_) => error!("command handler panicked"),
            }
            self.ctx.pool.put(msg);
        }
        info!("exiting command thread");
    }

    /// Feed one record through reassembly and, when it completes a command,
    /// dispatch it.
    pub fn process_command(&self, fifo: &FifoPath, msg: &Message) -> io::Result<()> {
        let command = {
            let mut cmds = self.cmds.lock().unwrap();
            match parser::parse(msg, &mut cmds) {
                Ok(complete) => complete,
                Err(err) => {
                    // An inconsistent record poisons the whole command;
                    // forget whatever had been assembled under its key.
                    cmds.remove(&(msg.sender_id, msg.message_id));
                    error!(
                        "bad record from sender {} message {}: {err}",
                        msg.sender_id, msg.message_id
                    );
                    return Ok(());
                }
            }
        };

        let Some(command) = command else {
            return Ok(());
        };
        self.log_command(&command);

        match COMMANDS.binary_search_by(|entry| entry.0.cmp(command.verb.as_str())) {
            Ok(pos) => (COMMANDS[pos].1)(self, fifo, &command),
            Err(_) => {
                self.unknown(&command);
                Ok(())
            }
        }
    }

    fn log_command(&self, c: &BrokerCommand) {
        const MAX_PATH: usize = 32;
        if c.path.len() < MAX_PATH {
            info!("verb:{} path:{}", c.verb, c.path);
        } else {
            info!("verb:{} path:{}...", c.verb, &c.path[..MAX_PATH]);
        }
    }

    // -----------------------------------------------------------------------
    // Handlers (invoked from the command thread only)
    // -----------------------------------------------------------------------

    fn echo(&self, _fifo: &FifoPath, c: &BrokerCommand) -> io::Result<()> {
        self.effects.echo(&c.path);
        Ok(())
    }

    fn gc(&self, _fifo: &FifoPath, c: &BrokerCommand) -> io::Result<()> {
        self.effects.start_gc(&c.path);

        let commits = self.commits.fetch_add(1, Ordering::AcqRel) + 1;
        self.ctx
            .commits
            .publish(|| serde_json::json!({ "commits": commits }).to_string());
        Ok(())
    }

    fn nop(&self, _fifo: &FifoPath, _c: &BrokerCommand) -> io::Result<()> {
        Ok(())
    }

    fn suicide(&self, _fifo: &FifoPath, _c: &BrokerCommand) -> io::Result<()> {
        self.effects.begin_shutdown();
        Ok(())
    }

    fn cquit(&self, _fifo: &FifoPath, _c: &BrokerCommand) -> io::Result<()> {
        self.commands_done.store(true, Ordering::Release);
        Ok(())
    }

    fn quit(&self, fifo: &FifoPath, _c: &BrokerCommand) -> io::Result<()> {
        // Wake a single pipe-reader thread, but only once shutdown has
        // actually begun: the reader exits when it observes `done` after the
        // wake record arrives.
        if !self.ctx.is_done() {
            info!("_QUIT ignored: not shutting down");
            return Ok(());
        }
        info!("waking one reader thread");
        self.effects.wake_reader(fifo)
    }

    fn unknown(&self, c: &BrokerCommand) {
        error!("unknown verb: {}", c.verb);
    }

    // -----------------------------------------------------------------------
    // Scavenging
    // -----------------------------------------------------------------------

    /// Evict partial commands whose most recent record arrived strictly
    /// before `now - delete_threshold`. The sender most likely crashed or
    /// lost interest before completing the message.
    pub fn scavenge(&self) {
        self.scavenge_at(SystemTime::now());
    }

    /// As [`scavenge`](Self::scavenge) with the clock supplied by the caller.
    pub fn scavenge_at(&self, now: SystemTime) {
        let earliest = now - self.delete_threshold;
        let mut cmds = self.cmds.lock().unwrap();
        cmds.retain(|key, pieces| {
            let keep = pieces.arrive_time >= earliest;
            if !keep {
                let idle = now
                    .duration_since(pieces.arrive_time)
                    .unwrap_or(Duration::ZERO);
                info!(
                    "deleted old partial command from sender {} message {} (idle {}s)",
                    key.0,
                    key.1,
                    idle.as_secs()
                );
            }
            keep
        });
    }
}
