// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The fixed-width wire record that clients push into the broker's named
// pipe. A command that does not fit one record is split across several
// records sharing a message id; the broker reassembles them (see parser.rs).

use thiserror::Error;

/// Size of one record on the pipe. Kept below the POSIX minimum `PIPE_BUF`
/// (512) so each record is written atomically.
pub const MESSAGE_SIZE: usize = 256;

/// Bytes taken by the four header fields.
pub const HEADER_BYTES: usize = 2 * 4 + 2 * 2;

/// The maximum number of payload bytes carried by a single record.
pub const PAYLOAD_CHARS: usize = MESSAGE_SIZE - HEADER_BYTES;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message part number must be less than the number of parts")]
    BadPartNumber,
}

/// One 256-byte record: a 12-byte little-endian header followed by a
/// NUL-padded payload.
///
/// The binary layout is stable and language-independent so that recorded
/// message files are portable: bytes 0–3 `sender_id`, 4–7 `message_id`,
/// 8–9 `part_no`, 10–11 `num_parts`, 12–255 `payload`.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    /// The sender's identity; by convention its process id. Together with
    /// `message_id` this uniquely identifies one command in flight.
    pub sender_id: u32,
    /// Sender-chosen counter identifying the command this record belongs to.
    pub message_id: u32,
    /// Zero-based index of this record within the command. Always less than
    /// `num_parts`.
    pub part_no: u16,
    /// Total number of records making up the command.
    pub num_parts: u16,
    /// Payload bytes; short payloads are NUL-padded on the right.
    pub payload: [u8; PAYLOAD_CHARS],
}

impl Message {
    /// Build a record carrying `content`. The sender id is this process's id.
    /// Content longer than [`PAYLOAD_CHARS`] is silently truncated; shorter
    /// content is NUL-padded.
    pub fn new(
        message_id: u32,
        part_no: u16,
        num_parts: u16,
        content: impl AsRef<[u8]>,
    ) -> Result<Self, MessageError> {
        if part_no >= num_parts {
            return Err(MessageError::BadPartNumber);
        }
        let src = content.as_ref();
        let mut payload = [0u8; PAYLOAD_CHARS];
        let n = src.len().min(PAYLOAD_CHARS);
        payload[..n].copy_from_slice(&src[..n]);
        Ok(Self {
            sender_id: std::process::id(),
            message_id,
            part_no,
            num_parts,
            payload,
        })
    }

    /// An all-zero record (`num_parts` = 1). Used as the one-shot wake frame
    /// written to the pipe during shutdown; its content is never inspected.
    pub const fn empty() -> Self {
        Self {
            sender_id: 0,
            message_id: 0,
            part_no: 0,
            num_parts: 1,
            payload: [0u8; PAYLOAD_CHARS],
        }
    }

    /// Payload with trailing NUL padding removed.
    pub fn payload_trimmed(&self) -> &[u8] {
        let end = self
            .payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p + 1);
        &self.payload[..end]
    }

    /// Serialize to the on-pipe form.
    pub fn to_bytes(&self) -> [u8; MESSAGE_SIZE] {
        let mut out = [0u8; MESSAGE_SIZE];
        out[0..4].copy_from_slice(&self.sender_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.message_id.to_le_bytes());
        out[8..10].copy_from_slice(&self.part_no.to_le_bytes());
        out[10..12].copy_from_slice(&self.num_parts.to_le_bytes());
        out[HEADER_BYTES..].copy_from_slice(&self.payload);
        out
    }

    /// Deserialize from the on-pipe form. Header fields are not validated
    /// here; the reassembler rejects records with an out-of-range part
    /// number.
    pub fn from_bytes(bytes: &[u8; MESSAGE_SIZE]) -> Self {
        let mut payload = [0u8; PAYLOAD_CHARS];
        payload.copy_from_slice(&bytes[HEADER_BYTES..]);
        Self {
            sender_id: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            message_id: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            part_no: u16::from_le_bytes(bytes[8..10].try_into().unwrap()),
            num_parts: u16::from_le_bytes(bytes[10..12].try_into().unwrap()),
            payload,
        }
    }

    /// Overwrite this record in place from the on-pipe form. Lets the read
    /// loop refill a pooled buffer without allocating.
    pub fn decode_from(&mut self, bytes: &[u8; MESSAGE_SIZE]) {
        *self = Self::from_bytes(bytes);
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("sender_id", &self.sender_id)
            .field("message_id", &self.message_id)
            .field("part_no", &self.part_no)
            .field("num_parts", &self.num_parts)
            .field("payload", &String::from_utf8_lossy(self.payload_trimmed()))
            .finish()
    }
}

/// Owned, heap-allocated record. This is what circulates between the pool,
/// the read loops, and the command queue; transfer is always by move.
pub type MessagePtr = Box<Message>;
