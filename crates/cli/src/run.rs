// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client entry point: connect, handshake, multiplex, exit.

use anyhow::Context;
use tokio::net::{TcpStream, UnixStream};

use crate::endpoint::{self, Endpoint};
use crate::frame::ClientInfo;
use crate::handshake::{self, SocketPaths};
use crate::rawmode::{self, RawModeGuard};
use crate::{envhash, mux};

/// Run one client invocation to completion. Returns the process exit code.
pub async fn run(args: Vec<String>) -> i32 {
    // Stage 0: raw mode while the session runs, restored on every exit path.
    let tty = rawmode::stdin_is_tty();
    let raw_guard = if tty {
        match RawModeGuard::enter() {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("juliaclient: failed to adjust terminal: {e}");
                None
            }
        }
    } else {
        None
    };

    let result = run_inner(args, tty).await;
    drop(raw_guard);

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("juliaclient: {e:#}");
            1
        }
    }
}

async fn run_inner(args: Vec<String>, tty: bool) -> anyhow::Result<i32> {
    // Stage 1: resolve and connect the conductor endpoint.
    let endpoint = endpoint::resolve()?;

    let env = envhash::snapshot();
    let info = ClientInfo {
        tty,
        pid: std::process::id(),
        cwd: std::env::current_dir()
            .context("cannot determine working directory")?
            .to_string_lossy()
            .into_owned(),
        env_fingerprint: envhash::fingerprint_pairs(&env),
        env: None,
        args,
    };

    // Stages 2–3: handshake, then receive the two session socket paths.
    let paths = match &endpoint {
        Endpoint::Unix(path) => {
            if !path.exists() {
                anyhow::bail!(
                    "no conductor socket at {} (is juliad running?)",
                    path.display()
                );
            }
            let mut stream = UnixStream::connect(path)
                .await
                .with_context(|| format!("connect {}", path.display()))?;
            handshake::handshake(&mut stream, &info, &env).await?
        }
        Endpoint::Tcp(addr) => {
            let mut stream = TcpStream::connect(addr)
                .await
                .with_context(|| format!("connect {addr}"))?;
            handshake::handshake(&mut stream, &info, &env).await?
        }
    };

    let SocketPaths { stdio, signals } = paths;
    let stdio_stream = UnixStream::connect(&stdio)
        .await
        .with_context(|| format!("connect stdio socket {stdio}"))?;
    let signals_stream = UnixStream::connect(&signals)
        .await
        .with_context(|| format!("connect signals socket {signals}"))?;

    // Unlink the session sockets right away so the worker can re-listen;
    // the connected fd pairs stay open until the session ends.
    let _ = std::fs::remove_file(&stdio);
    let _ = std::fs::remove_file(&signals);

    // Stage 4: pump until the worker signals exit.
    mux::pump(stdio_stream, signals_stream).await
}
