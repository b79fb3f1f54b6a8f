// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared state for one broker instance. Everything a worker thread needs is
// carried in this one record rather than in process-wide globals; the only
// true global in the crate is the signal latch, because signal handlers
// cannot carry context.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use crate::channel::Channel;
use crate::pool::MessagePool;

pub struct BrokerContext {
    /// Set once, atomically, when shutdown begins. Every worker loop checks
    /// it at its wake points.
    done: AtomicBool,
    /// The process exit code: 0 for a clean shutdown, the latched signal
    /// number or a failure code otherwise.
    exit_code: AtomicI32,
    /// Recycled message buffers shared by the read loops and the processor.
    pub pool: MessagePool,
    /// Telemetry topic fed by the GC handler.
    pub commits: Channel,
    /// Telemetry topic fed by the once-per-second ticker.
    pub uptime: Channel,
}

impl BrokerContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            done: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
            pool: MessagePool::new(),
            commits: Channel::new("commits"),
            uptime: Channel::new("uptime"),
        })
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Flip `done` from false to true. Returns `true` for exactly one
    /// caller; shutdown work must only be performed by that caller.
    pub fn begin_shutdown(&self) -> bool {
        self.done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::Release);
    }
}
