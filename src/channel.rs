// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Publish-side event channels for the telemetry surface.
//
// A channel is a named topic carrying JSON payloads. Publishing is gated on
// the subscriber count: with nobody listening the payload thunk is never
// invoked, so formatting cost is only paid when someone is watching.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

struct ChannelState {
    /// Monotonic publish counter; lets a subscriber detect a new message
    /// without comparing payloads.
    seq: u64,
    latest: Option<Arc<String>>,
}

/// A named publish-only topic.
pub struct Channel {
    name: &'static str,
    state: Mutex<ChannelState>,
    cv: Condvar,
    subscribers: AtomicUsize,
}

impl Channel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(ChannelState {
                seq: 0,
                latest: None,
            }),
            cv: Condvar::new(),
            subscribers: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Acquire)
    }

    /// Publish the payload produced by `thunk`, waking every subscriber.
    ///
    /// `thunk` runs exactly once when at least one subscriber is attached
    /// and not at all otherwise. The payload must be valid JSON.
    pub fn publish<F>(&self, thunk: F)
    where
        F: FnOnce() -> String,
    {
        if self.subscriber_count() == 0 {
            return;
        }
        let payload = thunk();
        debug_assert!(
            serde_json::from_str::<serde_json::Value>(&payload).is_ok(),
            "channel {} published invalid JSON: {payload}",
            self.name
        );
        let mut state = self.state.lock().unwrap();
        state.seq += 1;
        state.latest = Some(Arc::new(payload));
        self.cv.notify_all();
    }

    /// Attach a subscriber. The subscription detaches on drop.
    pub fn subscribe(&self) -> Subscription<'_> {
        self.subscribers.fetch_add(1, Ordering::AcqRel);
        let seq = self.state.lock().unwrap().seq;
        Subscription {
            channel: self,
            last_seq: seq,
        }
    }
}

/// A live attachment to a [`Channel`]. Holding one makes `publish` eager.
pub struct Subscription<'a> {
    channel: &'a Channel,
    last_seq: u64,
}

impl Subscription<'_> {
    /// Wait up to `timeout` for a message newer than the last one seen.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<Arc<String>> {
        let state = self.channel.state.lock().unwrap();
        let (state, result) = self
            .channel
            .cv
            .wait_timeout_while(state, timeout, |s| s.seq == self.last_seq)
            .unwrap();
        if result.timed_out() && state.seq == self.last_seq {
            return None;
        }
        self.last_seq = state.seq;
        state.latest.clone()
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.channel.subscribers.fetch_sub(1, Ordering::AcqRel);
    }
}
