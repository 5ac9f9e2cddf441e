// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three-stream multiplexer.
//!
//! Pumps bytes between the local terminal and the worker's session sockets:
//!
//! | tag | source | sink |
//! |---|---|---|
//! | `stdout`  | stdio socket | local stdout, verbatim |
//! | `stdin`   | local stdin  | stdio socket, verbatim |
//! | `signals` | signals socket | frame parser (sets the exit code) |
//!
//! There is no cross-stream ordering guarantee; within one stream bytes are
//! delivered in order. SIGINT is relayed to the worker as a single `0x03`
//! byte on the stdio socket and never terminates the client; SIGTERM is
//! deliberately left at its default disposition.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::sigframe::{SignalFrame, SignalParser};

/// How long to keep draining worker output after the exit frame arrives.
const DRAIN_AFTER_EXIT: Duration = Duration::from_millis(200);

/// Pump all three streams until the worker signals exit.
///
/// Returns the exit code clamped to `0..255`.
pub async fn pump(stdio: UnixStream, signals: UnixStream) -> anyhow::Result<i32> {
    // Local stdin is read on a dedicated blocking thread; the channel close
    // marks EOF. The thread is left parked on read(2) at process exit.
    let (stdin_tx, stdin_rx) = mpsc::channel::<Vec<u8>>(64);
    spawn_stdin_reader(stdin_tx);
    let mut stdout = std::io::stdout();
    pump_streams(stdio, signals, stdin_rx, &mut stdout).await
}

fn spawn_stdin_reader(stdin_tx: mpsc::Sender<Vec<u8>>) {
    std::thread::spawn(move || {
        use std::io::Read;
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        let mut buf = [0u8; 4096];
        loop {
            match handle.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

/// The multiplexer proper, with its endpoints injected: stdin arrives on a
/// channel and stdout is any writer, which is what the tests lean on.
async fn pump_streams<W: Write>(
    stdio: UnixStream,
    mut signals: UnixStream,
    mut stdin_rx: mpsc::Receiver<Vec<u8>>,
    out: &mut W,
) -> anyhow::Result<i32> {
    let (mut stdio_rd, mut stdio_wr) = stdio.into_split();

    let mut sigint = signal(SignalKind::interrupt()).ok();

    let mut parser = SignalParser::new();
    let mut out_buf = [0u8; 8192];
    let mut sig_buf = [0u8; 1024];
    let mut stdio_open = true;
    let mut stdin_open = true;

    let exit_code = loop {
        tokio::select! {
            read = stdio_rd.read(&mut out_buf), if stdio_open => {
                match read.context("stdio socket read")? {
                    0 => stdio_open = false,
                    n => forward(out, &out_buf[..n])?,
                }
            }

            data = stdin_rx.recv(), if stdin_open => {
                match data {
                    Some(bytes) => {
                        stdio_wr.write_all(&bytes).await.context("stdio socket write")?;
                    }
                    None => {
                        // Local stdin hit EOF; half-close so a worker reading
                        // program text from stdin sees EOF too.
                        stdin_open = false;
                        let _ = stdio_wr.shutdown().await;
                    }
                }
            }

            read = signals.read(&mut sig_buf) => {
                match read.context("signals socket read")? {
                    0 => anyhow::bail!("worker closed the signals socket without an exit frame"),
                    n => {
                        let frames = parser
                            .push(&sig_buf[..n])
                            .map_err(|e| anyhow::anyhow!("malformed signal frame: {e}"))?;
                        if let Some(code) = handle_frames(&frames)? {
                            break code;
                        }
                    }
                }
            }

            _ = recv_signal(&mut sigint) => {
                // Relay the interrupt to the remote worker; do not die locally.
                let _ = stdio_wr.write_all(&[0x03]).await;
            }
        }
    };

    // The exit frame can race ahead of buffered output; drain briefly.
    let deadline = tokio::time::Instant::now() + DRAIN_AFTER_EXIT;
    while stdio_open {
        match tokio::time::timeout_at(deadline, stdio_rd.read(&mut out_buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => forward(out, &out_buf[..n])?,
        }
    }

    Ok(exit_code.clamp(0, 255) as i32)
}

fn forward<W: Write>(out: &mut W, bytes: &[u8]) -> anyhow::Result<()> {
    out.write_all(bytes).context("local stdout write")?;
    out.flush().context("local stdout flush")?;
    Ok(())
}

fn handle_frames(frames: &[SignalFrame]) -> anyhow::Result<Option<i64>> {
    for frame in frames {
        if frame.name == "exit" {
            let code = frame
                .exit_code()
                .ok_or_else(|| anyhow::anyhow!("non-decimal exit frame data {:?}", frame.data))?;
            return Ok(Some(code));
        }
        anyhow::bail!("unrecognised signal frame {:?}", frame.name);
    }
    Ok(None)
}

async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig.as_mut() {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
