// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX signal latch: the self-pipe pattern. The handler's only actions are
// an atomic store of the signal number and a one-byte write to the pipe;
// the quit thread blocks reading the other end. Nothing here waits on a
// language-level condition variable, so the async-signal-safe contract
// holds.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicI32, Ordering};

// The signal handler cannot carry context, so the latched value and the
// pipe's write end are the one piece of truly process-global state in the
// crate.
static LATCHED_SIGNAL: AtomicI32 = AtomicI32::new(0);
static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);

/// Read side of the self-pipe. Owned by the quit thread.
pub struct SignalLatch {
    read_fd: OwnedFd,
}

impl SignalLatch {
    /// Create the pipe and publish its write end for the handler.
    pub fn create() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        for fd in fds {
            unsafe {
                libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
            }
        }
        NOTIFY_FD.store(fds[1], Ordering::Release);
        Ok(Self {
            read_fd: unsafe { OwnedFd::from_raw_fd(fds[0]) },
        })
    }

    /// Block until a signal (real or synthetic) has been latched and return
    /// its number.
    pub fn wait(&self) -> i32 {
        let mut buf = [0u8; 1];
        loop {
            let n = unsafe {
                libc::read(self.read_fd.as_raw_fd(), buf.as_mut_ptr().cast(), 1)
            };
            if n > 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if n < 0 && err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            // A closed pipe still means "stop waiting".
            break;
        }
        LATCHED_SIGNAL.load(Ordering::Acquire)
    }
}

/// Latch `signum` and wake the quit thread. Async-signal-safe: an atomic
/// store and a single `write`. Also callable from ordinary code (the
/// SUICIDE handler and the supervisor use it with a synthetic value).
pub fn notify_signal_latch(signum: i32) {
    LATCHED_SIGNAL.store(signum, Ordering::Release);
    let fd = NOTIFY_FD.load(Ordering::Acquire);
    if fd >= 0 {
        unsafe {
            libc::write(fd, b"q".as_ptr().cast(), 1);
        }
    }
}

/// Install handlers for the shutdown signal set and ignore SIGPIPE (a
/// vanished client must surface as EPIPE from `write`, not kill the
/// process). `signal-hook` saves and restores errno around the handler.
pub fn register_quit_signals() -> io::Result<()> {
    unsafe {
        signal_hook::low_level::register(libc::SIGINT, || {
            notify_signal_latch(libc::SIGINT)
        })?;
        signal_hook::low_level::register(libc::SIGTERM, || {
            notify_signal_latch(libc::SIGTERM)
        })?;
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
    Ok(())
}
