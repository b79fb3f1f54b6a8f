// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Record and playback of pipe records. A record file is the raw
// concatenation of 256-byte records in arrival order, no header or footer,
// so a captured session can be replayed deterministically for testing.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::message::{Message, MessagePtr, MESSAGE_SIZE};
use crate::pool::MessagePool;

/// Append-only sink of received records.
pub struct Recorder {
    file: Mutex<File>,
}

impl Recorder {
    /// Create the record file. Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one record. Serialized internally; safe to call from several
    /// read loops.
    pub fn record(&self, msg: &Message) -> io::Result<()> {
        let bytes = msg.to_bytes();
        let mut file = self.file.lock().unwrap();
        file.write_all(&bytes)
    }
}

/// Replays a record file one record per call.
pub struct Player {
    file: Mutex<File>,
}

impl Player {
    /// Open an existing record file for replay.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Read the next record into a pooled buffer. Returns `Ok(None)` at a
    /// clean end of file; a trailing partial record is an error.
    pub fn read(&self, pool: &MessagePool) -> io::Result<Option<MessagePtr>> {
        let mut bytes = [0u8; MESSAGE_SIZE];
        {
            let mut file = self.file.lock().unwrap();
            let mut filled = 0;
            while filled < MESSAGE_SIZE {
                let n = file.read(&mut bytes[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                return Ok(None);
            }
            if filled != MESSAGE_SIZE {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("short trailing record of {filled} bytes"),
                ));
            }
        }
        let mut msg = pool.get();
        msg.decode_from(&bytes);
        Ok(Some(msg))
    }
}
