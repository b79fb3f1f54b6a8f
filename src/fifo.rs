// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The broker's ingress transport: a named FIFO on POSIX, a named pipe on
// Windows. The broker creates the pipe if absent and reads 256-byte records
// from it; clients open the same path for writing.

use std::io;
use std::path::{Path, PathBuf};

use crate::message::{Message, MESSAGE_SIZE};

/// Location of the broker's pipe, with the platform default applied when no
/// override is given.
#[derive(Debug, Clone)]
pub struct FifoPath {
    path: PathBuf,
}

impl FifoPath {
    pub fn new(override_path: Option<&Path>) -> Self {
        let path = match override_path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };
        Self { path }
    }

    #[cfg(unix)]
    fn default_path() -> PathBuf {
        std::env::temp_dir().join("broker.fifo")
    }

    #[cfg(windows)]
    fn default_path() -> PathBuf {
        PathBuf::from(r"\\.\pipe\broker")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the read side, creating the pipe if it does not exist yet.
    pub fn open_server(&self) -> io::Result<ServerPipe> {
        ServerPipe::open(&self.path)
    }

    /// Open the write side. Blocks until the broker has the read side open.
    pub fn open_client(&self) -> io::Result<ClientPipe> {
        ClientPipe::open(&self.path)
    }
}

// ---------------------------------------------------------------------------
// POSIX — mkfifo + non-blocking read fd
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod imp {
    use super::*;
    use std::ffi::CString;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::os::unix::ffi::OsStrExt;

    /// The broker's end of the FIFO: a non-blocking read descriptor plus a
    /// write descriptor held open so that `read` reports would-block rather
    /// than end-of-file when every client has disconnected.
    pub struct ServerPipe {
        read_fd: OwnedFd,
        _write_fd: OwnedFd,
    }

    impl ServerPipe {
        pub(super) fn open(path: &Path) -> io::Result<Self> {
            let cpath = CString::new(path.as_os_str().as_bytes())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in pipe path"))?;

            // Create the FIFO if it is not already there. EEXIST from a
            // previous run is fine; anything else is fatal.
            if unsafe { libc::mkfifo(cpath.as_ptr(), 0o622) } != 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EEXIST) {
                    return Err(err);
                }
            }

            let read_fd = open_fd(&cpath, libc::O_RDONLY | libc::O_NONBLOCK)?;
            let write_fd = open_fd(&cpath, libc::O_WRONLY)?;
            Ok(Self {
                read_fd,
                _write_fd: write_fd,
            })
        }

        pub fn raw_fd(&self) -> RawFd {
            self.read_fd.as_raw_fd()
        }

        /// Read one record. Returns the number of bytes read (0 at
        /// would-block after data ran out), or an error for anything the
        /// read loop cannot absorb.
        pub fn read_bytes(&self, buf: &mut [u8; MESSAGE_SIZE]) -> io::Result<usize> {
            loop {
                let n = unsafe {
                    libc::read(
                        self.read_fd.as_raw_fd(),
                        buf.as_mut_ptr().cast(),
                        MESSAGE_SIZE,
                    )
                };
                if n >= 0 {
                    return Ok(n as usize);
                }
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::EAGAIN) => return Ok(0),
                    #[allow(unreachable_patterns)] // EAGAIN == EWOULDBLOCK on Linux
                    Some(libc::EWOULDBLOCK) => return Ok(0),
                    _ => return Err(err),
                }
            }
        }

        /// Block until the descriptor is readable or `timeout_secs` elapse.
        /// Returns `true` when data (or an error condition) is pending.
        pub fn wait_readable(&self, timeout_secs: u32) -> io::Result<bool> {
            let fd = self.read_fd.as_raw_fd();
            let mut timeout = libc::timeval {
                tv_sec: timeout_secs as libc::time_t,
                tv_usec: 0,
            };
            unsafe {
                let mut rfds: libc::fd_set = std::mem::zeroed();
                let mut efds: libc::fd_set = std::mem::zeroed();
                libc::FD_ZERO(&mut rfds);
                libc::FD_SET(fd, &mut rfds);
                libc::FD_ZERO(&mut efds);
                libc::FD_SET(fd, &mut efds);
                let rv = libc::select(
                    fd + 1,
                    &mut rfds,
                    std::ptr::null_mut(),
                    &mut efds,
                    &mut timeout,
                );
                match rv {
                    -1 => {
                        let err = io::Error::last_os_error();
                        if err.raw_os_error() == Some(libc::EINTR) {
                            Ok(false)
                        } else {
                            Err(err)
                        }
                    }
                    0 => Ok(false),
                    _ => Ok(true),
                }
            }
        }
    }

    fn open_fd(cpath: &CString, flags: libc::c_int) -> io::Result<OwnedFd> {
        let fd = loop {
            let fd = unsafe { libc::open(cpath.as_ptr(), flags) };
            if fd >= 0 {
                break fd;
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(err);
            }
        };
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    /// How long a client keeps retrying its open while the broker has no
    /// read side up yet.
    const CLIENT_OPEN_RETRIES: u32 = 20;
    const CLIENT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

    /// A client's write handle on the FIFO.
    pub struct ClientPipe {
        fd: OwnedFd,
    }

    impl ClientPipe {
        pub(super) fn open(path: &Path) -> io::Result<Self> {
            let cpath = CString::new(path.as_os_str().as_bytes())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in pipe path"))?;

            // A non-blocking open fails with ENXIO while nobody has the
            // read side; retry briefly rather than blocking forever.
            let mut tries = 0;
            loop {
                match open_fd(&cpath, libc::O_WRONLY | libc::O_NONBLOCK) {
                    Ok(fd) => return Ok(Self { fd }),
                    Err(err)
                        if err.raw_os_error() == Some(libc::ENXIO)
                            && tries < CLIENT_OPEN_RETRIES =>
                    {
                        tries += 1;
                        std::thread::sleep(CLIENT_RETRY_DELAY);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        /// Write one record. `PIPE_BUF` atomicity means the write either
        /// lands whole or not at all; a broken pipe is reported as `false`
        /// rather than an error, matching the transport contract.
        pub fn write_message(&self, msg: &Message) -> io::Result<bool> {
            let bytes = msg.to_bytes();
            let n = unsafe {
                libc::write(
                    self.fd.as_raw_fd(),
                    bytes.as_ptr().cast(),
                    MESSAGE_SIZE,
                )
            };
            if n == MESSAGE_SIZE as isize {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EPIPE) => Ok(false),
                #[allow(unreachable_patterns)]
                Some(libc::EWOULDBLOCK) => Ok(false),
                _ if n >= 0 => Ok(false),
                _ => Err(err),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Windows — named pipe, blocking reads
// ---------------------------------------------------------------------------

#[cfg(windows)]
mod imp {
    use super::*;
    use std::ffi::CString;

    use windows_sys::Win32::Foundation::{
        CloseHandle, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE, ERROR_PIPE_CONNECTED,
    };
    use windows_sys::Win32::Storage::FileSystem::{
        CreateFileA, ReadFile, WriteFile, FILE_SHARE_READ, OPEN_EXISTING,
    };
    use windows_sys::Win32::System::Pipes::{
        ConnectNamedPipe, CreateNamedPipeA, DisconnectNamedPipe, PIPE_ACCESS_INBOUND,
        PIPE_READMODE_BYTE, PIPE_TYPE_BYTE, PIPE_UNLIMITED_INSTANCES, PIPE_WAIT,
    };

    fn c_path(path: &Path) -> io::Result<CString> {
        let s = path.to_str().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "non-UTF-8 pipe path")
        })?;
        CString::new(s).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in pipe path"))
    }

    /// One inbound instance of the named pipe. Each read loop owns its own
    /// instance; shutdown is driven by the injected wake frame rather than a
    /// poll timeout.
    pub struct ServerPipe {
        handle: HANDLE,
        connected: std::cell::Cell<bool>,
    }

    // The handle is only used from the owning read loop.
    unsafe impl Send for ServerPipe {}

    impl ServerPipe {
        pub(super) fn open(path: &Path) -> io::Result<Self> {
            let cpath = c_path(path)?;
            let handle = unsafe {
                CreateNamedPipeA(
                    cpath.as_ptr().cast(),
                    PIPE_ACCESS_INBOUND,
                    PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT,
                    PIPE_UNLIMITED_INSTANCES,
                    0,
                    MESSAGE_SIZE as u32,
                    0,
                    std::ptr::null(),
                )
            };
            if handle == INVALID_HANDLE_VALUE {
                return Err(io::Error::last_os_error());
            }
            Ok(Self {
                handle,
                connected: std::cell::Cell::new(false),
            })
        }

        pub fn read_bytes(&self, buf: &mut [u8; MESSAGE_SIZE]) -> io::Result<usize> {
            if !self.connected.get() {
                if unsafe { ConnectNamedPipe(self.handle, std::ptr::null_mut()) } == 0 {
                    let err = io::Error::last_os_error();
                    // A client may have raced the connect call.
                    if err.raw_os_error() != Some(ERROR_PIPE_CONNECTED as i32) {
                        return Err(err);
                    }
                }
                self.connected.set(true);
            }
            let mut read = 0u32;
            let ok = unsafe {
                ReadFile(
                    self.handle,
                    buf.as_mut_ptr().cast(),
                    MESSAGE_SIZE as u32,
                    &mut read,
                    std::ptr::null_mut(),
                )
            };
            if ok == 0 {
                // Client went away; disconnect and wait for the next one.
                unsafe { DisconnectNamedPipe(self.handle) };
                self.connected.set(false);
                return Ok(0);
            }
            Ok(read as usize)
        }

        pub fn wait_readable(&self, _timeout_secs: u32) -> io::Result<bool> {
            // Reads block in ReadFile/ConnectNamedPipe on this platform.
            Ok(true)
        }
    }

    impl Drop for ServerPipe {
        fn drop(&mut self) {
            unsafe { CloseHandle(self.handle) };
        }
    }

    pub struct ClientPipe {
        handle: HANDLE,
    }

    unsafe impl Send for ClientPipe {}

    impl ClientPipe {
        pub(super) fn open(path: &Path) -> io::Result<Self> {
            let cpath = c_path(path)?;
            let handle = unsafe {
                CreateFileA(
                    cpath.as_ptr().cast(),
                    GENERIC_WRITE,
                    FILE_SHARE_READ,
                    std::ptr::null(),
                    OPEN_EXISTING,
                    0,
                    std::ptr::null_mut(),
                )
            };
            if handle == INVALID_HANDLE_VALUE {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { handle })
        }

        pub fn write_message(&self, msg: &Message) -> io::Result<bool> {
            let bytes = msg.to_bytes();
            let mut written = 0u32;
            let ok = unsafe {
                WriteFile(
                    self.handle,
                    bytes.as_ptr().cast(),
                    MESSAGE_SIZE as u32,
                    &mut written,
                    std::ptr::null_mut(),
                )
            };
            if ok == 0 {
                return Ok(false);
            }
            Ok(written as usize == MESSAGE_SIZE)
        }
    }

    impl Drop for ClientPipe {
        fn drop(&mut self) {
            unsafe { CloseHandle(self.handle) };
        }
    }
}

pub use imp::{ClientPipe, ServerPipe};
