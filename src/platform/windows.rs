// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows signal latch. Console control events are dispatched on a
// dedicated thread by the C runtime, so an ordinary mutex + condvar latch
// is sound here; the POSIX self-pipe constraint does not apply.

use std::io;
use std::sync::{Condvar, Mutex};

use windows_sys::Win32::Foundation::{BOOL, TRUE};
use windows_sys::Win32::System::Console::{
    SetConsoleCtrlHandler, CTRL_BREAK_EVENT, CTRL_CLOSE_EVENT, CTRL_C_EVENT,
};

/// The conventional numbers for the signals the latch reports.
const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

static LATCHED: Mutex<Option<i32>> = Mutex::new(None);
static CV: Condvar = Condvar::new();

/// Handle to the latch. Owned by the quit thread.
pub struct SignalLatch;

impl SignalLatch {
    pub fn create() -> io::Result<Self> {
        Ok(Self)
    }

    /// Block until a signal (real or synthetic) has been latched and return
    /// its number.
    pub fn wait(&self) -> i32 {
        let mut latched = LATCHED.lock().unwrap();
        loop {
            if let Some(signum) = *latched {
                return signum;
            }
            latched = CV.wait(latched).unwrap();
        }
    }
}

/// Latch `signum` and wake the quit thread.
pub fn notify_signal_latch(signum: i32) {
    *LATCHED.lock().unwrap() = Some(signum);
    CV.notify_all();
}

unsafe extern "system" fn ctrl_handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT => notify_signal_latch(SIGINT),
        CTRL_CLOSE_EVENT => notify_signal_latch(SIGTERM),
        _ => return 0,
    }
    TRUE
}

/// Install the console control handler for the shutdown events.
pub fn register_quit_signals() -> io::Result<()> {
    if unsafe { SetConsoleCtrlHandler(Some(ctrl_handler), TRUE) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
