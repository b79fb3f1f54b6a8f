// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for event-channel publish gating.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use libbroker::channel::Channel;

#[test]
fn publish_without_subscribers_never_runs_the_thunk() {
    let channel = Channel::new("commits");
    let calls = AtomicUsize::new(0);

    channel.publish(|| {
        calls.fetch_add(1, Ordering::Relaxed);
        r#"{"commits": 1}"#.to_string()
    });

    assert_eq!(channel.subscriber_count(), 0);
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn publish_with_a_subscriber_runs_the_thunk_exactly_once() {
    let channel = Channel::new("commits");
    let calls = AtomicUsize::new(0);

    let mut sub = channel.subscribe();
    assert_eq!(channel.subscriber_count(), 1);

    channel.publish(|| {
        calls.fetch_add(1, Ordering::Relaxed);
        r#"{"commits": 7}"#.to_string()
    });
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    let payload = sub.next_timeout(Duration::from_secs(1)).expect("payload");
    assert_eq!(payload.as_str(), r#"{"commits": 7}"#);
}

#[test]
fn dropping_the_subscription_restores_gating() {
    let channel = Channel::new("uptime");
    {
        let _sub = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);
    }
    assert_eq!(channel.subscriber_count(), 0);

    let calls = AtomicUsize::new(0);
    channel.publish(|| {
        calls.fetch_add(1, Ordering::Relaxed);
        r#"{"uptime": 1}"#.to_string()
    });
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn waiting_subscriber_is_woken_by_publish() {
    let channel = Arc::new(Channel::new("uptime"));

    let waiter = thread::spawn({
        let channel = Arc::clone(&channel);
        move || {
            let mut sub = channel.subscribe();
            sub.next_timeout(Duration::from_secs(5))
        }
    });

    // Wait until the subscription is registered, then publish.
    while channel.subscriber_count() == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(20));
    channel.publish(|| r#"{"uptime": 99}"#.to_string());

    let payload = waiter.join().expect("waiter").expect("payload");
    assert_eq!(payload.as_str(), r#"{"uptime": 99}"#);
}

#[test]
fn next_timeout_times_out_on_a_quiet_channel() {
    let channel = Channel::new("uptime");
    let mut sub = channel.subscribe();
    assert!(sub.next_timeout(Duration::from_millis(50)).is_none());
}

#[test]
fn a_late_subscriber_sees_only_newer_messages() {
    let channel = Channel::new("commits");

    // Publish while subscribed so the message lands.
    let mut first = channel.subscribe();
    channel.publish(|| r#"{"commits": 1}"#.to_string());
    assert!(first.next_timeout(Duration::from_millis(50)).is_some());

    // A subscriber attaching afterwards does not replay history.
    let mut second = channel.subscribe();
    assert!(second.next_timeout(Duration::from_millis(50)).is_none());
}
