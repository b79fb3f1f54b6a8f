// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Background sweeper for the partial-command map. Wakes on a fixed tick (or
// an explicit shutdown nudge) and asks the command processor to drop
// partial commands that have been idle too long.

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use log::info;

use crate::command::CommandProcessor;
use crate::context::BrokerContext;

/// Time between scavenging sweeps.
pub const SCAVENGE_TICK: Duration = Duration::from_secs(10 * 60);

pub struct Scavenger {
    ctx: Arc<BrokerContext>,
    /// Non-owning handle: the scavenger must not keep the processor alive
    /// past teardown, and tolerates it being gone by skipping the sweep.
    cp: Weak<CommandProcessor>,
    mut_: Mutex<()>,
    cv: Condvar,
}

impl Scavenger {
    pub fn new(ctx: Arc<BrokerContext>, cp: Weak<CommandProcessor>) -> Self {
        Self {
            ctx,
            cp,
            mut_: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    /// Run until the broker's `done` flag is observed.
    pub fn thread_entry(&self) {
        let mut guard = self.mut_.lock().unwrap();
        loop {
            guard = self.cv.wait_timeout(guard, SCAVENGE_TICK).unwrap().0;
            if self.ctx.is_done() {
                break;
            }
            info!("begin scavenging");
            if let Some(cp) = self.cp.upgrade() {
                cp.scavenge();
            }
            info!("scavenging done");
        }
        info!("scavenger thread exiting");
    }

    /// Nudge the thread so it re-checks `done` without waiting out the tick.
    pub fn shutdown(&self) {
        let _guard = self.mut_.lock().unwrap();
        self.cv.notify_all();
    }
}
