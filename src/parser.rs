// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reassembly of multi-part pipe records into whole commands.
//
// Records belonging to one command share a (sender id, message id) pair and
// may arrive in any order, interleaved with records from other senders. A
// partially assembled command lives in the map until its last record arrives
// or the scavenger decides the sender has given up.

use std::collections::HashMap;
use std::time::SystemTime;

use thiserror::Error;

use crate::message::Message;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("message part number must be less than the number of parts")]
    PartNumberTooLarge,
    #[error("total number of parts mismatch")]
    NumberOfPartsMismatch,
}

/// A whole command: the first whitespace-delimited token of the reassembled
/// payload and everything after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerCommand {
    pub verb: String,
    pub path: String,
}

impl BrokerCommand {
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
        }
    }
}

/// A command whose records have not all arrived yet.
#[derive(Debug)]
pub struct Pieces {
    /// When the most recent record for this command arrived. Touched on
    /// every record, not just the first, so a slow sender is not evicted
    /// mid-message.
    pub arrive_time: SystemTime,
    /// Slot `i` holds the payload of the record with `part_no == i`.
    pub slots: Vec<Option<String>>,
}

/// Partially assembled commands keyed by (sender id, message id).
pub type PartialCmds = HashMap<(u32, u32), Pieces>;

/// Skip at most one leading whitespace character.
fn skip_ws(s: &str) -> &str {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_whitespace() => match chars.next() {
            Some((i, _)) => &s[i..],
            None => "",
        },
        _ => s,
    }
}

/// Split off the first whitespace-delimited word.
fn extract_word(s: &str) -> (&str, &str) {
    match s.find(|c: char| c.is_ascii_whitespace()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    }
}

/// Feed one record into the partial-command map.
///
/// Returns `Ok(Some(command))` when this record completes a command,
/// `Ok(None)` when more records are still outstanding. On error the map is
/// left without an entry for a record that failed validation; a mismatched
/// part count leaves the existing entry in place for the caller to discard.
pub fn parse(msg: &Message, cmds: &mut PartialCmds) -> Result<Option<BrokerCommand>, ParseError> {
    parse_at(msg, cmds, SystemTime::now())
}

/// As [`parse`], with the arrival clock supplied by the caller.
pub fn parse_at(
    msg: &Message,
    cmds: &mut PartialCmds,
    now: SystemTime,
) -> Result<Option<BrokerCommand>, ParseError> {
    if msg.part_no >= msg.num_parts {
        return Err(ParseError::PartNumberTooLarge);
    }

    let payload = String::from_utf8_lossy(msg.payload_trimmed()).into_owned();

    let entry = cmds
        .entry((msg.sender_id, msg.message_id))
        .or_insert_with(|| Pieces {
            arrive_time: now,
            slots: vec![None; usize::from(msg.num_parts)],
        });

    // Record the arrival of this newest piece of the set.
    entry.arrive_time = now;

    if entry.slots.len() != usize::from(msg.num_parts) {
        return Err(ParseError::NumberOfPartsMismatch);
    }

    let slot = &mut entry.slots[usize::from(msg.part_no)];
    let was_missing = slot.is_none();
    *slot = Some(payload);

    if was_missing && entry.slots.iter().all(Option::is_some) {
        let pieces = cmds
            .remove(&(msg.sender_id, msg.message_id))
            .expect("entry inserted above");
        let complete: String = pieces.slots.into_iter().map(Option::unwrap).collect();

        let (verb, rest) = extract_word(skip_ws(&complete));
        let path = skip_ws(rest);
        return Ok(Some(BrokerCommand::new(verb, path)));
    }

    Ok(None)
}
