// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the record file writer and the deterministic-replay player.

use std::io::Write;

use libbroker::message::{Message, MESSAGE_SIZE};
use libbroker::pool::MessagePool;
use libbroker::recorder::{Player, Recorder};

#[test]
fn record_then_replay_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.rec");

    let messages = [
        Message::new(1, 0, 1, "GC /data/one").expect("message"),
        Message::new(2, 0, 2, "ECHO partial").expect("message"),
        Message::new(2, 1, 2, " rest").expect("message"),
    ];

    let recorder = Recorder::create(&path).expect("create");
    for m in &messages {
        recorder.record(m).expect("record");
    }
    drop(recorder);

    let pool = MessagePool::new();
    let player = Player::open(&path).expect("open");
    for expected in &messages {
        let got = player.read(&pool).expect("read").expect("record present");
        assert_eq!(&*got, expected);
        pool.put(got);
    }
    assert!(player.read(&pool).expect("read").is_none(), "clean EOF");
}

#[test]
fn create_refuses_an_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("already-there.rec");
    std::fs::write(&path, b"previous session").expect("write");

    assert!(Recorder::create(&path).is_err());
}

#[test]
fn player_reports_a_short_trailing_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("truncated.rec");

    let whole = Message::new(1, 0, 1, "NOP").expect("message");
    let mut file = std::fs::File::create(&path).expect("create");
    file.write_all(&whole.to_bytes()).expect("write");
    file.write_all(&whole.to_bytes()[..MESSAGE_SIZE / 2])
        .expect("write");
    drop(file);

    let pool = MessagePool::new();
    let player = Player::open(&path).expect("open");
    let first = player.read(&pool).expect("read").expect("whole record");
    assert_eq!(&*first, &whole);

    assert!(player.read(&pool).is_err(), "short record is an error");
}

#[test]
fn player_on_an_empty_file_is_immediate_eof() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.rec");
    std::fs::File::create(&path).expect("create");

    let pool = MessagePool::new();
    let player = Player::open(&path).expect("open");
    assert!(player.read(&pool).expect("read").is_none());
}
