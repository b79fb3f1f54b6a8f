// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Once-per-second uptime tick published on the `uptime` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::info;

use crate::context::BrokerContext;

/// Tick until `done` is set, publishing `{"uptime": N}` every second.
///
/// The sleep targets an advancing deadline rather than a fixed interval so
/// the tick count does not drift as publish work accumulates.
pub fn uptime(ctx: &BrokerContext, done: &AtomicBool) {
    info!("uptime 1 second tick starting");

    let mut seconds = 0u64;
    let mut until = Instant::now();
    while !done.load(Ordering::Acquire) {
        until += Duration::from_secs(1);
        std::thread::sleep(until.saturating_duration_since(Instant::now()));
        seconds += 1;

        ctx.uptime
            .publish(|| serde_json::json!({ "uptime": seconds }).to_string());
    }

    info!("uptime thread exiting");
}
