// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-band signal frames on the signals socket.
//!
//! Wire form is `SOH name STX data EOT` with ASCII name and data. The only
//! frame the conductor suite currently emits is `exit` with a signed decimal
//! code, but the parser is name-agnostic.

use thiserror::Error;

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const EOT: u8 = 0x04;

/// Parser state is bounded: a frame larger than this is malformed.
const MAX_BUFFER: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal frame does not start with SOH")]
    MissingSoh,
    #[error("duplicate STX in signal frame")]
    DuplicateStx,
    #[error("EOT without STX in signal frame")]
    EotWithoutStx,
    #[error("signal frame exceeds {MAX_BUFFER} bytes")]
    Overflow,
    #[error("non-ASCII byte in signal frame")]
    NonAscii,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFrame {
    pub name: String,
    pub data: String,
}

impl SignalFrame {
    /// Decimal payload of an `exit` frame, if this is one.
    pub fn exit_code(&self) -> Option<i64> {
        (self.name == "exit").then(|| self.data.parse().ok()).flatten()
    }
}

/// Encode one frame.
pub fn encode(name: &str, data: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + data.len() + 3);
    out.push(SOH);
    out.extend_from_slice(name.as_bytes());
    out.push(STX);
    out.extend_from_slice(data.as_bytes());
    out.push(EOT);
    out
}

/// Convenience for the one frame everything emits.
pub fn encode_exit(code: i32) -> Vec<u8> {
    encode("exit", &code.to_string())
}

/// Incremental, fragmentation-tolerant frame parser.
///
/// Bytes are appended via [`push`](Self::push); complete frames are returned
/// in order and the unconsumed remainder is shifted forward. Malformed input
/// is a hard error: the stream has no resynchronisation point.
#[derive(Debug, Default)]
pub struct SignalParser {
    buf: Vec<u8>,
}

impl SignalParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SignalFrame>, SignalError> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            if self.buf.is_empty() {
                break;
            }
            if self.buf[0] != SOH {
                return Err(SignalError::MissingSoh);
            }
            let Some(eot) = self.buf.iter().position(|&b| b == EOT) else {
                break; // incomplete frame, wait for more bytes
            };
            let body = &self.buf[1..eot];
            let stx_count = body.iter().filter(|&&b| b == STX).count();
            match stx_count {
                0 => return Err(SignalError::EotWithoutStx),
                1 => {}
                _ => return Err(SignalError::DuplicateStx),
            }
            let stx = body.iter().position(|&b| b == STX).unwrap() + 1;
            let name = &self.buf[1..stx];
            let data = &self.buf[stx + 1..eot];
            if !name.is_ascii() || !data.is_ascii() {
                return Err(SignalError::NonAscii);
            }
            frames.push(SignalFrame {
                name: String::from_utf8_lossy(name).into_owned(),
                data: String::from_utf8_lossy(data).into_owned(),
            });
            self.buf.drain(..=eot);
        }
        // Only an incomplete frame may be carried forward, and it is bounded.
        if self.buf.len() > MAX_BUFFER {
            return Err(SignalError::Overflow);
        }
        Ok(frames)
    }
}

#[cfg(test)]
#[path = "sigframe_tests.rs"]
mod tests;
