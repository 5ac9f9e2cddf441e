// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One warm worker process, as seen from the conductor.
//!
//! The conductor listens on a per-worker control socket, spawns the worker
//! binary pointing at it, and accepts exactly one connection. Every
//! interaction with that connection is serialised under the worker's mutex.
//! A worker is either unassigned (the reserve) or bound to exactly one
//! project path; once bound it is never re-bound.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::capture::CaptureBuffer;
use crate::control::{self, ControlReply, ControlRequest, SessionSpec};
use crate::paths::{RuntimePaths, RUNTIME_DIR_ENV};

/// Environment variable carrying the control socket path to the worker.
pub const CONTROL_SOCKET_ENV: &str = "JULIA_DAEMON_CONTROL_SOCKET";

/// How long a freshly spawned worker gets to dial the control socket.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on any single control round trip.
const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace between SIGTERM and SIGKILL when tearing a worker down.
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Everything needed to spawn a worker, cloneable for background tasks.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    pub executable: String,
    pub args: Vec<String>,
    pub ttl_secs: u64,
    pub paths: RuntimePaths,
}

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

pub struct Worker {
    pub id: u32,
    pub ctime: Instant,
    pid: u32,
    project: parking_lot::Mutex<Option<PathBuf>>,
    child: tokio::sync::Mutex<Child>,
    control: tokio::sync::Mutex<Option<ControlConn>>,
    capture: Arc<CaptureBuffer>,
}

impl Worker {
    /// Spawn the worker binary and accept its control connection.
    pub async fn spawn(launcher: &WorkerLauncher, id: u32) -> anyhow::Result<Arc<Self>> {
        let control_path = launcher.paths.control_socket(id);
        let _ = std::fs::remove_file(&control_path);
        let listener = UnixListener::bind(&control_path)
            .with_context(|| format!("bind control socket {}", control_path.display()))?;

        let mut child = Command::new(&launcher.executable)
            .args(&launcher.args)
            .env(CONTROL_SOCKET_ENV, &control_path)
            .env(RUNTIME_DIR_ENV, launcher.paths.dir())
            .env("JULIA_DAEMON_WORKER_TTL", launcher.ttl_secs.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn worker {}", launcher.executable))?;

        let pid = child.id().unwrap_or_default();
        let capture = Arc::new(CaptureBuffer::default());
        if let Some(stdout) = child.stdout.take() {
            spawn_capture(stdout, capture.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_capture(stderr, capture.clone());
        }

        let accepted = tokio::time::timeout(CONNECT_TIMEOUT, listener.accept()).await;
        // One connection per worker; the listener and its socket file are
        // done once the worker has dialed in.
        drop(listener);
        let _ = std::fs::remove_file(&control_path);

        let stream = match accepted {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(e).context("accept worker control connection");
            }
            Err(_) => {
                let _ = child.kill().await;
                anyhow::bail!(
                    "worker {id} (pid {pid}) never connected its control socket; output: {}",
                    capture.tail()
                );
            }
        };

        let (read_half, write_half) = stream.into_split();
        Ok(Arc::new(Self {
            id,
            ctime: Instant::now(),
            pid,
            project: parking_lot::Mutex::new(None),
            child: tokio::sync::Mutex::new(child),
            control: tokio::sync::Mutex::new(Some(ControlConn {
                reader: BufReader::new(read_half),
                writer: write_half,
            })),
            capture,
        }))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The project this worker is bound to, if any.
    pub fn project(&self) -> Option<PathBuf> {
        self.project.lock().clone()
    }

    /// Whether the worker process is still running.
    pub async fn is_alive(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    /// Ask the worker to start a client session; returns the stdio and
    /// signals socket paths it created.
    pub async fn start_session(&self, spec: SessionSpec) -> anyhow::Result<(String, String)> {
        let mut guard = self.control.lock().await;
        let conn = guard.as_mut().context("worker control connection closed")?;
        control::write_line(&mut conn.writer, &ControlRequest::Client { spec }).await?;
        let stdio = expect_socket(conn).await?;
        let signals = expect_socket(conn).await?;
        Ok((stdio, signals))
    }

    /// Evaluate an expression in the worker's top scope.
    pub async fn eval(&self, expr: &str) -> anyhow::Result<String> {
        let mut guard = self.control.lock().await;
        let conn = guard.as_mut().context("worker control connection closed")?;
        control::write_line(&mut conn.writer, &ControlRequest::Eval { expr: expr.to_owned() })
            .await?;
        match read_reply(conn).await? {
            ControlReply::Result { value } => Ok(value),
            ControlReply::Error { message } => anyhow::bail!("worker eval failed: {message}"),
            ControlReply::Socket { .. } => anyhow::bail!("unexpected socket reply to eval"),
        }
    }

    /// Bind an unassigned worker to a project. Binding is permanent.
    pub async fn bind_project(&self, project: &std::path::Path) -> anyhow::Result<()> {
        {
            let bound = self.project.lock();
            if let Some(existing) = bound.as_ref() {
                anyhow::bail!(
                    "worker {} already bound to {}",
                    self.id,
                    existing.display()
                );
            }
        }
        self.eval(&format!("set_project({:?})", project.to_string_lossy())).await?;
        *self.project.lock() = Some(project.to_path_buf());
        Ok(())
    }

    /// Current number of live sessions in the worker.
    pub async fn client_count(&self) -> anyhow::Result<u32> {
        let value = self.eval("client_count").await?;
        value.parse().with_context(|| format!("bad client_count reply {value:?}"))
    }

    /// Request exit-once-idle. Fire and forget.
    pub async fn soft_exit(&self) {
        let mut guard = self.control.lock().await;
        if let Some(conn) = guard.as_mut() {
            let _ = control::write_line(&mut conn.writer, &ControlRequest::SoftExit).await;
        }
    }

    /// Kill the worker process: SIGTERM, a short grace, then SIGKILL.
    pub async fn kill(&self) {
        self.control.lock().await.take();

        let mut child = self.child.lock().await;
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        if self.pid != 0 {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(self.pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
        if !self.capture.is_empty() {
            debug!(worker = self.id, "worker output tail:\n{}", self.capture.tail());
        }
    }

    /// Log the captured output of a worker that died on its own.
    pub fn report_death(&self) {
        if self.capture.is_empty() {
            warn!(worker = self.id, pid = self.pid, "worker process exited");
        } else {
            warn!(
                worker = self.id,
                pid = self.pid,
                "worker process exited; output tail:\n{}",
                self.capture.tail()
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn stub(id: u32, child: Child, project: Option<PathBuf>) -> Arc<Self> {
        let pid = child.id().unwrap_or_default();
        Arc::new(Self {
            id,
            ctime: Instant::now(),
            pid,
            project: parking_lot::Mutex::new(project),
            child: tokio::sync::Mutex::new(child),
            control: tokio::sync::Mutex::new(None),
            capture: Arc::new(CaptureBuffer::default()),
        })
    }
}

async fn read_reply(conn: &mut ControlConn) -> anyhow::Result<ControlReply> {
    let reply = tokio::time::timeout(RPC_TIMEOUT, control::read_line(&mut conn.reader))
        .await
        .context("worker control reply timed out")??;
    reply.context("worker closed the control connection")
}

async fn expect_socket(conn: &mut ControlConn) -> anyhow::Result<String> {
    match read_reply(conn).await? {
        ControlReply::Socket { path } => Ok(path),
        ControlReply::Error { message } => anyhow::bail!("worker refused session: {message}"),
        ControlReply::Result { .. } => anyhow::bail!("unexpected result reply to client request"),
    }
}

fn spawn_capture<R>(mut reader: R, capture: Arc<CaptureBuffer>)
where
    R: AsyncReadExt + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => capture.write(&buf[..n]),
            }
        }
    });
}
