// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Recycling pool of message buffers.
//
// Buffer life-cycle: a read loop draws a buffer from the pool before each
// read from the pipe, fills it, and moves it onto the command queue. Once
// the command thread has processed it, the buffer comes back here. The pool
// has no cap; its population is bounded by the number of buffers in flight
// across the read threads plus the queue depth.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::message::{Message, MessagePtr};

/// A monitor around a FIFO of owned message buffers.
///
/// `get` never blocks: when the pool is empty it allocates a fresh buffer
/// instead, keeping allocation off the steady-state read path.
#[derive(Default)]
pub struct MessagePool {
    queue: Mutex<VecDeque<MessagePtr>>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a buffer, allocating if the pool is empty.
    pub fn get(&self) -> MessagePtr {
        let mut queue = self.queue.lock().unwrap();
        match queue.pop_front() {
            Some(buf) => buf,
            None => {
                drop(queue);
                Box::new(Message::empty())
            }
        }
    }

    /// Return a buffer for reuse.
    pub fn put(&self, buf: MessagePtr) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(buf);
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}
