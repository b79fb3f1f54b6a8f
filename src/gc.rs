// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Garbage-collection child processes. A GC command spawns one collector
// per store path; the watcher thread reaps exits and forgets finished
// collections. At most one collection runs per path at a time.

use std::collections::HashMap;
use std::process::{Child, Command};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use log::{error, info};

/// Name of the collector executable launched for each `GC` command. Found
/// via `PATH` unless the daemon was told otherwise.
pub const DEFAULT_GC_EXE: &str = "vacuumd";

/// How often the watcher sweeps for exited collectors.
const REAP_TICK: Duration = Duration::from_secs(2);

struct GcState {
    /// Live collections keyed by store path.
    processes: HashMap<String, Child>,
    done: bool,
}

pub struct GcWatcher {
    exe: String,
    state: Mutex<GcState>,
    cv: Condvar,
}

impl GcWatcher {
    pub fn new(exe: impl Into<String>) -> Self {
        Self {
            exe: exe.into(),
            state: Mutex::new(GcState {
                processes: HashMap::new(),
                done: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Launch a collection for `path`. A second request for a path whose
    /// collection is still running is ignored.
    pub fn start_vacuum(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        if state.done {
            return;
        }
        if state.processes.contains_key(path) {
            info!("GC for {path} is already running");
            return;
        }
        match Command::new(&self.exe).arg(path).spawn() {
            Ok(child) => {
                info!("started GC process {} for {path}", child.id());
                state.processes.insert(path.to_string(), child);
                self.cv.notify_all();
            }
            Err(err) => error!("failed to start GC for {path}: {err}"),
        }
    }

    /// Number of collections currently believed live.
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().processes.len()
    }

    /// Reap collector exits until [`stop`](Self::stop) is called. On the
    /// way out, any still-running collector is asked to stop and waited
    /// for.
    pub fn thread_entry(&self) {
        let mut state = self.state.lock().unwrap();
        loop {
            state = self.cv.wait_timeout(state, REAP_TICK).unwrap().0;
            if state.done {
                break;
            }
            Self::reap(&mut state.processes);
        }

        info!("cleaning up GC processes");
        for (path, child) in &mut state.processes {
            info!("interrupting GC for {path}");
            interrupt(child);
        }
        for (path, mut child) in state.processes.drain() {
            match child.wait() {
                Ok(status) => info!("GC for {path} stopped: {status}"),
                Err(err) => error!("wait for GC {path} failed: {err}"),
            }
        }
        info!("gcwatch thread exiting");
    }

    fn reap(processes: &mut HashMap<String, Child>) {
        processes.retain(|path, child| match child.try_wait() {
            Ok(Some(status)) => {
                info!("GC exited for {path}: {status}");
                false
            }
            Ok(None) => true,
            Err(err) => {
                error!("wait for GC {path} failed: {err}");
                false
            }
        });
    }

    /// Ask the watcher (and every live collector) to stop.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.done = true;
        self.cv.notify_all();
    }
}

/// Politely interrupt a collector: SIGINT where that exists so the child
/// can checkpoint, a hard kill elsewhere.
#[cfg(unix)]
fn interrupt(child: &mut Child) {
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    let _ = child.kill();
}
