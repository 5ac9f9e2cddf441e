// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded tail capture of a worker's own stdout/stderr.
//!
//! Workers talk to clients over session sockets; anything on their standard
//! streams is diagnostics. We keep the most recent bytes so a dead worker
//! can be post-mortemed without unbounded memory.

use std::collections::VecDeque;

use parking_lot::Mutex;

pub const DEFAULT_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
pub struct CaptureBuffer {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { buf: Mutex::new(VecDeque::with_capacity(capacity.min(4096))), capacity }
    }

    /// Append bytes, discarding the oldest once over capacity.
    pub fn write(&self, data: &[u8]) {
        let mut buf = self.buf.lock();
        let keep = data.len().min(self.capacity);
        buf.extend(&data[data.len() - keep..]);
        while buf.len() > self.capacity {
            buf.pop_front();
        }
    }

    /// The retained tail as a lossy string.
    pub fn tail(&self) -> String {
        let buf = self.buf.lock();
        let (a, b) = buf.as_slices();
        let mut bytes = Vec::with_capacity(buf.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
