// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared test fixtures: a spy wiring of the dispatcher's capability set and
// a processor factory around it. Not every test binary uses every helper.
#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libbroker::command::{CommandProcessor, Effects};
use libbroker::context::BrokerContext;
use libbroker::fifo::FifoPath;
use libbroker::message::Message;

/// Records every capability invocation instead of acting on the world.
#[derive(Default)]
pub struct SpyEffects {
    pub gc_paths: Mutex<Vec<String>>,
    pub echoes: Mutex<Vec<String>>,
    pub shutdowns: AtomicUsize,
    pub reader_wakes: AtomicUsize,
}

impl SpyEffects {
    pub fn gc_count(&self) -> usize {
        self.gc_paths.lock().unwrap().len()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::Acquire)
    }

    pub fn wake_count(&self) -> usize {
        self.reader_wakes.load(Ordering::Acquire)
    }
}

/// Owning handle handed to the processor; the test keeps the inner `Arc`.
pub struct SpyHandle(pub Arc<SpyEffects>);

impl Effects for SpyHandle {
    fn start_gc(&self, path: &str) {
        self.0.gc_paths.lock().unwrap().push(path.to_string());
    }

    fn begin_shutdown(&self) {
        self.0.shutdowns.fetch_add(1, Ordering::AcqRel);
    }

    fn wake_reader(&self, _fifo: &FifoPath) -> io::Result<()> {
        self.0.reader_wakes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn echo(&self, path: &str) {
        self.0.echoes.lock().unwrap().push(path.to_string());
    }
}

pub struct Fixture {
    pub ctx: Arc<BrokerContext>,
    pub spy: Arc<SpyEffects>,
    pub cp: Arc<CommandProcessor>,
    pub fifo: FifoPath,
}

/// A processor wired to a spy, with a FIFO path that is never opened.
pub fn fixture(num_read_threads: u32, scavenge_time: Duration) -> Fixture {
    let ctx = BrokerContext::new();
    let spy = Arc::new(SpyEffects::default());
    let cp = Arc::new(CommandProcessor::new(
        Arc::clone(&ctx),
        Box::new(SpyHandle(Arc::clone(&spy))),
        num_read_threads,
        scavenge_time,
    ));
    let fifo = FifoPath::new(Some(std::path::Path::new("unused-test-fifo")));
    Fixture {
        ctx,
        spy,
        cp,
        fifo,
    }
}

/// A single-record command carrying `content`.
pub fn one_part(mid: u32, content: &str) -> Message {
    Message::new(mid, 0, 1, content).expect("well-formed message")
}
