// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for client-side command framing.

use std::io;

use libbroker::message::{Message, PAYLOAD_CHARS};
use libbroker::parser::{parse, BrokerCommand, PartialCmds};
use libbroker::send_message::{next_message_id, send_message, MessageWriter};

/// Captures every record instead of writing to a pipe.
#[derive(Default)]
struct SpyWriter {
    written: Vec<Message>,
}

impl MessageWriter for SpyWriter {
    fn write(&mut self, msg: &Message) -> io::Result<()> {
        self.written.push(msg.clone());
        Ok(())
    }
}

#[test]
fn single_part() {
    let mut wr = SpyWriter::default();
    send_message(&mut wr, "hello", "world").expect("send");

    // Tests share the process-wide message-id counter, so compare against
    // the id actually drawn.
    let mid = wr.written[0].message_id;
    let expected = Message::new(mid, 0, 1, "hello world").expect("message");
    assert_eq!(wr.written, vec![expected]);
    assert!(next_message_id() > mid);
}

#[test]
fn verb_without_path_omits_the_separator() {
    let mut wr = SpyWriter::default();
    send_message(&mut wr, "NOP", "").expect("send");
    assert_eq!(wr.written.len(), 1);
    assert_eq!(wr.written[0].payload_trimmed(), b"NOP");
}

// A payload one byte over the record capacity splits into exactly two
// records: "verb " plus 239 fill characters, then the remaining 5.
#[test]
fn two_parts() {
    let verb = "verb";
    let part1_chars = PAYLOAD_CHARS - verb.len() - 1;
    let path = "p".repeat(part1_chars + 1);
    let part2_chars = path.len() - part1_chars;

    let mut wr = SpyWriter::default();
    send_message(&mut wr, verb, &path).expect("send");

    let mid = wr.written[0].message_id;
    let expected1 = Message::new(
        mid,
        0,
        2,
        format!("{verb} {}", "p".repeat(part1_chars)),
    )
    .expect("message");
    let expected2 = Message::new(mid, 1, 2, "p".repeat(part2_chars)).expect("message");
    assert_eq!(wr.written, vec![expected1, expected2]);
}

// ceil((verb + 1 + path) / PAYLOAD_CHARS) records, contiguous part numbers,
// one shared message id, and the whole thing survives reassembly.
#[test]
fn framing_law_round_trips_through_the_parser() {
    for path_len in [0usize, 1, 238, 239, 240, 488, 1000] {
        let verb = "VERB";
        let path = "q".repeat(path_len);
        let mut wr = SpyWriter::default();
        send_message(&mut wr, verb, &path).expect("send");

        let payload_len = verb.len() + if path.is_empty() { 0 } else { 1 + path.len() };
        let expected_parts = payload_len.div_ceil(PAYLOAD_CHARS);
        assert_eq!(wr.written.len(), expected_parts, "path_len {path_len}");

        let mid = wr.written[0].message_id;
        for (i, m) in wr.written.iter().enumerate() {
            assert_eq!(usize::from(m.part_no), i);
            assert_eq!(usize::from(m.num_parts), expected_parts);
            assert_eq!(m.message_id, mid);
        }

        let mut cmds = PartialCmds::new();
        let mut complete = None;
        for m in &wr.written {
            if let Some(c) = parse(m, &mut cmds).expect("parse") {
                complete = Some(c);
            }
        }
        assert_eq!(complete, Some(BrokerCommand::new(verb, path)));
        assert!(cmds.is_empty());
    }
}

#[test]
fn message_ids_increase_between_sends() {
    let mut wr = SpyWriter::default();
    send_message(&mut wr, "A", "").expect("send");
    send_message(&mut wr, "B", "").expect("send");
    assert!(wr.written[1].message_id > wr.written[0].message_id);
}
