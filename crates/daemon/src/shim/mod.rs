// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-worker supervisor.
//!
//! A worker process connects back to the conductor's control socket and
//! serves tagged control messages: `client` starts a session behind a fresh
//! pair of stdio/signals sockets, `eval` answers top-scope expressions, and
//! `softexit` requests exit once the last session drains. Session bodies run
//! on blocking tasks; this loop stays async and is the only writer on the
//! control connection.

pub mod replio;
pub mod sandbox;
pub mod session;

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::io::BufReader;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

use crate::control::{self, ControlReply, ControlRequest, SessionSpec};
use crate::paths::RuntimePaths;
use sandbox::Runtime;

/// How long a client gets to dial its freshly minted session sockets.
const SESSION_ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

struct ShimState {
    clients: parking_lot::Mutex<Vec<SessionRecord>>,
    soft_exit: AtomicBool,
    last_client_time: parking_lot::Mutex<Instant>,
    project: parking_lot::Mutex<Option<String>>,
    seq: AtomicU32,
}

struct SessionRecord {
    id: u32,
    #[allow(dead_code)]
    started: Instant,
}

/// Run the worker shim until the conductor hangs up.
pub async fn run(
    runtime: Arc<dyn Runtime>,
    control_path: PathBuf,
    ttl: Option<Duration>,
) -> anyhow::Result<()> {
    let paths = RuntimePaths::from_env();
    let session_dir = paths.worker_session_dir(std::process::id());
    std::fs::create_dir_all(&session_dir)
        .with_context(|| format!("create session dir {}", session_dir.display()))?;
    let _ = std::fs::set_permissions(&session_dir, std::fs::Permissions::from_mode(0o700));

    let stream = UnixStream::connect(&control_path)
        .await
        .with_context(|| format!("connect control socket {}", control_path.display()))?;
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let state = Arc::new(ShimState {
        clients: parking_lot::Mutex::new(Vec::new()),
        soft_exit: AtomicBool::new(false),
        last_client_time: parking_lot::Mutex::new(Instant::now()),
        project: parking_lot::Mutex::new(None),
        seq: AtomicU32::new(0),
    });

    info!(pid = std::process::id(), "worker shim connected");

    loop {
        let request: Option<ControlRequest> = control::read_line(&mut reader).await?;
        let Some(request) = request else {
            info!("conductor closed the control connection; exiting");
            break;
        };
        match request {
            ControlRequest::Client { spec } => {
                handle_client(&runtime, &state, &session_dir, &mut writer, spec, ttl).await?;
            }
            ControlRequest::Eval { expr } => {
                let reply = match top_eval(&runtime, &state, &expr) {
                    Ok(value) => ControlReply::Result { value },
                    Err(e) => ControlReply::Error { message: format!("{e:#}") },
                };
                control::write_line(&mut writer, &reply).await?;
            }
            ControlRequest::SoftExit => {
                if state.clients.lock().is_empty() {
                    info!("soft exit requested while idle; exiting");
                    std::process::exit(0);
                }
                state.soft_exit.store(true, Ordering::SeqCst);
                info!("soft exit armed; will exit after the last session");
            }
        }
    }

    // Clean up the session dir on orderly exit; sockets inside are transient.
    let _ = std::fs::remove_dir_all(&session_dir);
    Ok(())
}

/// Top-scope evaluation. The control-plane expressions the conductor uses
/// are answered natively; everything else goes to the embedded runtime.
fn top_eval(
    runtime: &Arc<dyn Runtime>,
    state: &Arc<ShimState>,
    expr: &str,
) -> anyhow::Result<String> {
    let expr = expr.trim();
    if expr == "nothing" {
        return Ok("nothing".to_owned());
    }
    if expr == "client_count" {
        return Ok(state.clients.lock().len().to_string());
    }
    if let Some(inner) = expr.strip_prefix("set_project(\"").and_then(|s| s.strip_suffix("\")")) {
        *state.project.lock() = Some(inner.to_owned());
        return Ok("nothing".to_owned());
    }
    runtime.top_eval(expr)
}

async fn handle_client(
    runtime: &Arc<dyn Runtime>,
    state: &Arc<ShimState>,
    session_dir: &std::path::Path,
    writer: &mut OwnedWriteHalf,
    spec: SessionSpec,
    ttl: Option<Duration>,
) -> anyhow::Result<()> {
    let seq = state.seq.fetch_add(1, Ordering::Relaxed);
    let stdio_path = session_dir.join(format!("stdio-{seq}.sock"));
    let signals_path = session_dir.join(format!("signals-{seq}.sock"));
    let _ = std::fs::remove_file(&stdio_path);
    let _ = std::fs::remove_file(&signals_path);

    let stdio_listener = UnixListener::bind(&stdio_path)
        .with_context(|| format!("bind {}", stdio_path.display()))?;
    let signals_listener = UnixListener::bind(&signals_path)
        .with_context(|| format!("bind {}", signals_path.display()))?;

    control::write_line(
        writer,
        &ControlReply::Socket { path: stdio_path.to_string_lossy().into_owned() },
    )
    .await?;
    control::write_line(
        writer,
        &ControlReply::Socket { path: signals_path.to_string_lossy().into_owned() },
    )
    .await?;

    let stdio = match accept_one(&stdio_listener).await {
        Some(stream) => stream,
        None => {
            warn!("client never connected its stdio socket; discarding session");
            discard(&stdio_path, &signals_path);
            return Ok(());
        }
    };
    let signals = match accept_one(&signals_listener).await {
        Some(stream) => stream,
        None => {
            warn!("client never connected its signals socket; discarding session");
            discard(&stdio_path, &signals_path);
            return Ok(());
        }
    };
    drop(stdio_listener);
    drop(signals_listener);

    // Convert to blocking streams for the session body.
    let stdio = into_blocking(stdio).context("stdio stream")?;
    let signals = into_blocking(signals).context("signals stream")?;

    let id = seq;
    state.clients.lock().push(SessionRecord { id, started: Instant::now() });
    info!(session = id, client_pid = spec.pid, "session started");

    let runtime = runtime.clone();
    let state = state.clone();
    let project = state.project.lock().clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            session::run_blocking(runtime.as_ref(), &spec, project, stdio, signals)
        })
        .await;
        if let Err(e) = result {
            warn!(session = id, "session task panicked: {e}");
        }
        finish_session(&state, id, ttl);
    });

    Ok(())
}

/// Post-session bookkeeping: deregister, arm soft-exit, schedule the TTL.
fn finish_session(state: &Arc<ShimState>, id: u32, ttl: Option<Duration>) {
    {
        let mut clients = state.clients.lock();
        clients.retain(|record| record.id != id);
        *state.last_client_time.lock() = Instant::now();
        if state.soft_exit.load(Ordering::SeqCst) && clients.is_empty() {
            info!(session = id, "last session ended with soft exit armed; exiting");
            std::process::exit(0);
        }
    }
    info!(session = id, "session ended");

    if let Some(ttl) = ttl {
        let state = state.clone();
        let armed_at = *state.last_client_time.lock();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let idle = state.clients.lock().is_empty();
            let untouched = *state.last_client_time.lock() == armed_at;
            if idle && untouched {
                info!(ttl_secs = ttl.as_secs(), "idle TTL expired; exiting");
                std::process::exit(0);
            }
        });
    }
}

async fn accept_one(listener: &UnixListener) -> Option<UnixStream> {
    match tokio::time::timeout(SESSION_ACCEPT_TIMEOUT, listener.accept()).await {
        Ok(Ok((stream, _))) => Some(stream),
        Ok(Err(e)) => {
            warn!("session socket accept failed: {e}");
            None
        }
        Err(_) => None,
    }
}

fn into_blocking(stream: UnixStream) -> anyhow::Result<std::os::unix::net::UnixStream> {
    let std_stream = stream.into_std()?;
    std_stream.set_nonblocking(false)?;
    Ok(std_stream)
}

fn discard(stdio: &std::path::Path, signals: &std::path::Path) {
    let _ = std::fs::remove_file(stdio);
    let _ = std::fs::remove_file(signals);
}
