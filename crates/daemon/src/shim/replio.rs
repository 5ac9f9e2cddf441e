// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session stdio over the client's socket.
//!
//! The "terminal" a session writes to is a Unix stream; anything a REPL
//! would normally learn from termios must come in explicitly. The only such
//! capability today is the color flag.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;

use juliaclient::args::{Switch, SwitchKind};

/// Buffered, bidirectional handle on the session's stdio socket.
pub struct SessionIo {
    out: UnixStream,
    inp: BufReader<UnixStream>,
    pub color: bool,
}

impl SessionIo {
    pub fn new(stream: UnixStream, color: bool) -> io::Result<Self> {
        let inp = BufReader::new(stream.try_clone()?);
        Ok(Self { out: stream, inp, color })
    }

    /// Read one line of input. `None` at EOF.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.inp.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Read the remaining input to EOF, as program text.
    pub fn read_to_end_string(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.inp.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl Write for SessionIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Decide the session's color flag from `--color` and the client env.
/// Default is yes when `TERM` starts with "xterm", else no.
pub fn color_enabled(switches: &[Switch], env: &[(String, String)]) -> bool {
    let requested = switches
        .iter()
        .rev()
        .find(|s| s.kind() == SwitchKind::Color)
        .map(|s| s.value.as_str());
    match requested {
        Some("yes") => true,
        Some("no") => false,
        _ => env
            .iter()
            .find(|(key, _)| key == "TERM")
            .map(|(_, term)| term.starts_with("xterm"))
            .unwrap_or(false),
    }
}

#[cfg(test)]
#[path = "replio_tests.rs"]
mod tests;
