// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the eviction of stale partial commands.

mod common;

use std::time::{Duration, SystemTime};

use common::fixture;
use libbroker::message::Message;

const THRESHOLD: Duration = Duration::from_secs(4 * 60 * 60);

fn partial(mid: u32) -> Message {
    // Part 0 of 2: never completes on its own.
    Message::new(mid, 0, 2, "GC /some/store").expect("well-formed message")
}

// The boundary is half-open: an entry whose newest record arrived within
// the threshold survives; one strictly older than `now - threshold` is
// removed.
#[test]
fn scavenge_boundary() {
    let f = fixture(1, THRESHOLD);
    f.cp.process_command(&f.fifo, &partial(1)).expect("process");
    assert_eq!(f.cp.pending_partials(), 1);
    let inserted = SystemTime::now();

    // One second short of the threshold: retained.
    f.cp.scavenge_at(inserted + THRESHOLD - Duration::from_secs(1));
    assert_eq!(f.cp.pending_partials(), 1);

    // One second past it: evicted.
    f.cp.scavenge_at(inserted + THRESHOLD + Duration::from_secs(1));
    assert_eq!(f.cp.pending_partials(), 0);
}

#[test]
fn scavenge_keeps_fresh_and_drops_stale() {
    let f = fixture(1, THRESHOLD);
    f.cp.process_command(&f.fifo, &partial(1)).expect("process");
    let first_inserted = SystemTime::now();

    // Run the clock most of the way out, then a second partial arrives.
    let later = first_inserted + THRESHOLD - Duration::from_secs(10);
    f.cp.process_command(&f.fifo, &partial(2)).expect("process");
    assert_eq!(f.cp.pending_partials(), 2);

    // At `later` nothing has aged out yet.
    f.cp.scavenge_at(later);
    assert_eq!(f.cp.pending_partials(), 2);
}

// A record arriving for an old entry refreshes its arrival time; eviction
// is measured from the newest piece, not the first.
#[test]
fn a_new_part_refreshes_the_clock() {
    let f = fixture(1, THRESHOLD);

    // Three parts; deliver two now.
    let p0 = Message::new(7, 0, 3, "GC /x").expect("message");
    let p1 = Message::new(7, 1, 3, "y").expect("message");
    f.cp.process_command(&f.fifo, &p0).expect("process");
    f.cp.process_command(&f.fifo, &p1).expect("process");
    let refreshed = SystemTime::now();

    // Even far beyond the first record's age, the entry survives as long
    // as the *latest* record is in range.
    f.cp.scavenge_at(refreshed + THRESHOLD - Duration::from_secs(1));
    assert_eq!(f.cp.pending_partials(), 1);

    f.cp.scavenge_at(refreshed + THRESHOLD + Duration::from_secs(1));
    assert_eq!(f.cp.pending_partials(), 0);
}

#[test]
fn scavenge_of_an_empty_map_is_harmless() {
    let f = fixture(1, THRESHOLD);
    f.cp.scavenge();
    assert_eq!(f.cp.pending_partials(), 0);
}
