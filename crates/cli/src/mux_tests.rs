// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use super::*;
use crate::sigframe::encode;

fn session_pairs() -> (UnixStream, UnixStream, UnixStream, UnixStream) {
    let (stdio_local, stdio_worker) = UnixStream::pair().unwrap();
    let (signals_local, signals_worker) = UnixStream::pair().unwrap();
    (stdio_local, stdio_worker, signals_local, signals_worker)
}

#[tokio::test]
async fn stdin_pipes_through_the_worker_to_stdout() {
    let (stdio, mut stdio_worker, signals, mut signals_worker) = session_pairs();
    let (stdin_tx, stdin_rx) = mpsc::channel(8);

    // Worker echoes three bytes of input back to the client, then exits 0.
    let worker = tokio::spawn(async move {
        let mut buf = [0u8; 3];
        stdio_worker.read_exact(&mut buf).await.unwrap();
        stdio_worker.write_all(&buf).await.unwrap();
        drop(stdio_worker);
        signals_worker.write_all(&encode("exit", "0")).await.unwrap();
    });

    stdin_tx.send(b"ABC".to_vec()).await.unwrap();
    let mut out = Vec::new();
    let code = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(out, b"ABC");
    worker.await.unwrap();
}

#[tokio::test]
async fn stdin_eof_half_closes_the_stdio_socket() {
    let (stdio, mut stdio_worker, signals, mut signals_worker) = session_pairs();
    let (stdin_tx, stdin_rx) = mpsc::channel(8);

    // Worker reads program text to EOF, which only arrives if the client
    // shuts its write half down after local stdin closes.
    let worker = tokio::spawn(async move {
        let mut text = Vec::new();
        stdio_worker.read_to_end(&mut text).await.unwrap();
        assert_eq!(text, b"exit(5)");
        drop(stdio_worker);
        signals_worker.write_all(&encode("exit", "5")).await.unwrap();
    });

    stdin_tx.send(b"exit(5)".to_vec()).await.unwrap();
    drop(stdin_tx); // local stdin EOF

    let mut out = Vec::new();
    let code = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap();

    assert_eq!(code, 5);
    assert_eq!(out, b"");
    worker.await.unwrap();
}

#[tokio::test]
async fn output_racing_the_exit_frame_is_drained() {
    let (stdio, mut stdio_worker, signals, mut signals_worker) = session_pairs();
    let (_stdin_tx, stdin_rx) = mpsc::channel(8);

    let worker = tokio::spawn(async move {
        stdio_worker.write_all(b"hello").await.unwrap();
        signals_worker.write_all(&encode("exit", "7")).await.unwrap();
        // These bytes may land after the exit frame is already parsed; the
        // drain pass must still deliver them.
        stdio_worker.write_all(b" world").await.unwrap();
        drop(stdio_worker);
    });

    let mut out = Vec::new();
    let code = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap();

    assert_eq!(code, 7);
    assert_eq!(out, b"hello world");
    worker.await.unwrap();
}

#[tokio::test]
async fn exit_codes_clamp_to_a_byte() {
    for (data, expected) in [("300", 255), ("-7", 0), ("255", 255)] {
        let (stdio, stdio_worker, signals, mut signals_worker) = session_pairs();
        let (_stdin_tx, stdin_rx) = mpsc::channel(8);

        drop(stdio_worker);
        signals_worker.write_all(&encode("exit", data)).await.unwrap();

        let mut out = Vec::new();
        let code = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap();
        assert_eq!(code, expected, "exit data {data:?}");
    }
}

#[tokio::test]
async fn unrecognised_signal_name_is_an_error() {
    let (stdio, _stdio_worker, signals, mut signals_worker) = session_pairs();
    let (_stdin_tx, stdin_rx) = mpsc::channel(8);

    signals_worker.write_all(&encode("winch", "1")).await.unwrap();

    let mut out = Vec::new();
    let err = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap_err();
    assert!(err.to_string().contains("unrecognised"), "got {err:#}");
}

#[tokio::test]
async fn malformed_signal_stream_aborts() {
    let (stdio, _stdio_worker, signals, mut signals_worker) = session_pairs();
    let (_stdin_tx, stdin_rx) = mpsc::channel(8);

    signals_worker.write_all(b"garbage").await.unwrap();

    let mut out = Vec::new();
    let err = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap_err();
    assert!(err.to_string().contains("malformed"), "got {err:#}");
}

#[tokio::test]
async fn signals_hangup_without_exit_frame_is_an_error() {
    let (stdio, _stdio_worker, signals, signals_worker) = session_pairs();
    let (_stdin_tx, stdin_rx) = mpsc::channel(8);

    drop(signals_worker);

    let mut out = Vec::new();
    let err = pump_streams(stdio, signals, stdin_rx, &mut out).await.unwrap_err();
    assert!(err.to_string().contains("without an exit frame"), "got {err:#}");
}
