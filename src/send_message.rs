// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Client-side command submission: turns a (verb, path) pair into one or
// more wire records and hands them to a writer. The writer is a trait so
// tests can capture the records instead of owning a pipe.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::fifo::ClientPipe;
use crate::message::{Message, PAYLOAD_CHARS};

static MESSAGE_ID: AtomicU32 = AtomicU32::new(0);

/// Destination for outgoing records.
pub trait MessageWriter {
    fn write(&mut self, msg: &Message) -> io::Result<()>;
}

/// Production writer: one record per `write_message` on the client pipe.
pub struct PipeWriter {
    pipe: ClientPipe,
}

impl PipeWriter {
    pub fn new(pipe: ClientPipe) -> Self {
        Self { pipe }
    }
}

impl MessageWriter for PipeWriter {
    fn write(&mut self, msg: &Message) -> io::Result<()> {
        if self.pipe.write_message(msg)? {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "broker pipe dropped the record",
            ))
        }
    }
}

/// Submit one command.
///
/// The payload is `verb` followed, when `path` is non-empty, by a single
/// space and `path`. It is split into `ceil(len / PAYLOAD_CHARS)` records
/// sharing one message id, with contiguous part numbers starting at zero.
pub fn send_message(writer: &mut dyn MessageWriter, verb: &str, path: &str) -> io::Result<()> {
    let mut payload = String::with_capacity(verb.len() + 1 + path.len());
    payload.push_str(verb);
    if !path.is_empty() {
        payload.push(' ');
        payload.push_str(path);
    }
    let bytes = payload.as_bytes();

    let num_parts = bytes.len().div_ceil(PAYLOAD_CHARS);
    let num_parts = u16::try_from(num_parts)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "command payload too long"))?;

    let mid = MESSAGE_ID.fetch_add(1, Ordering::Relaxed);

    for part in 0..num_parts {
        let first = usize::from(part) * PAYLOAD_CHARS;
        let last = (first + PAYLOAD_CHARS).min(bytes.len());
        let msg = Message::new(mid, part, num_parts, &bytes[first..last])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        writer.write(&msg)?;
    }
    Ok(())
}

/// The message id the next [`send_message`] call will use.
pub fn next_message_id() -> u32 {
    MESSAGE_ID.load(Ordering::Relaxed)
}
