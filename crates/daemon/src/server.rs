// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The conductor: socket server, handshake, dispatch, lifecycle.
//!
//! Connections are accepted sequentially and handled inline — a spawned task
//! per connection measurably adds latency that dominates a hello-world
//! invocation, and every handler either finishes in microseconds or is
//! waiting on a worker the next client would be waiting on anyway.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use juliaclient::args::{ClientArgs, SwitchKind};
use juliaclient::endpoint::Endpoint;
use juliaclient::frame::{self, ProtocolError, ENV_REQUEST};
use juliaclient::sigframe;

use crate::config::Config;
use crate::control::SessionSpec;
use crate::envcache::EnvCache;
use crate::paths::RuntimePaths;
use crate::pool::{PoolContext, WorkerPool};
use crate::project;
use crate::reserve::ReserveSlot;
use crate::worker::WorkerLauncher;

/// Ceiling on one inline client exchange, worker spawn included.
const SERVE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a client gets to dial the canned-reply sockets.
const REPLY_ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Conductor {
    endpoint: Endpoint,
    paths: RuntimePaths,
    launcher: WorkerLauncher,
    maxclients: Option<u32>,
    pool: WorkerPool,
    reserve: Arc<ReserveSlot>,
    env_cache: EnvCache,
    ids: Arc<AtomicU32>,
    reply_seq: AtomicU32,
    shutdown: CancellationToken,
}

enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

/// Run the daemon to completion (signal-triggered shutdown).
pub async fn run(config: Config) -> anyhow::Result<()> {
    let conductor = Arc::new(Conductor::new(&config)?);
    spawn_signal_handlers(conductor.shutdown.clone());
    conductor.start().await
}

impl Conductor {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let endpoint = config.endpoint()?;
        let paths = RuntimePaths::for_endpoint(&endpoint);
        let launcher = WorkerLauncher {
            executable: config.worker_executable.clone(),
            args: config.worker_argv(),
            ttl_secs: config.worker_ttl,
            paths: paths.clone(),
        };
        Ok(Self {
            endpoint,
            paths,
            launcher,
            maxclients: config.maxclients(),
            pool: WorkerPool::new(),
            reserve: Arc::new(ReserveSlot::new()),
            env_cache: EnvCache::default(),
            ids: Arc::new(AtomicU32::new(1)),
            reply_seq: AtomicU32::new(0),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops [`start`](Self::start) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept and serve clients until shutdown, then tear everything down.
    pub async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        // Refusing to run beats running without a place for sockets.
        self.paths.ensure().context("prepare worker environment")?;

        let mut listener = self.bind()?;
        info!(endpoint = %self.endpoint, "conductor listening");

        ReserveSlot::spawn_replenish(
            self.reserve.clone(),
            self.launcher.clone(),
            self.ids.clone(),
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = accept_once(&mut listener, &self.endpoint) => {
                    match accepted {
                        Ok(stream) => self.serve_stream(stream).await,
                        Err(e) => {
                            warn!("accept failed: {e:#}");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                    }
                }
            }
        }

        info!("conductor shutting down");
        self.pool.kill_all().await;
        self.reserve.kill().await;
        if let Some(socket) = self.endpoint.unix_path() {
            let _ = std::fs::remove_file(socket);
            if self.paths.owns(socket) {
                let _ = std::fs::remove_dir_all(self.paths.dir());
            }
        }
        Ok(())
    }

    fn bind(&self) -> anyhow::Result<Listener> {
        match &self.endpoint {
            Endpoint::Unix(path) => {
                let _ = std::fs::remove_file(path);
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("bind {}", path.display()))?;
                Ok(Listener::Unix(listener))
            }
            Endpoint::Tcp(addr) => {
                let listener = std::net::TcpListener::bind(addr)
                    .with_context(|| format!("bind {addr}"))?;
                listener.set_nonblocking(true)?;
                Ok(Listener::Tcp(TcpListener::from_std(listener)?))
            }
        }
    }

    async fn serve_stream(&self, stream: ClientStream) {
        let result = match stream {
            ClientStream::Unix(mut s) => {
                tokio::time::timeout(SERVE_TIMEOUT, self.handle_client(&mut s)).await
            }
            ClientStream::Tcp(mut s) => {
                tokio::time::timeout(SERVE_TIMEOUT, self.handle_client(&mut s)).await
            }
        };
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => match e.downcast_ref::<ProtocolError>() {
                Some(proto) => warn!("protocol error, closing connection: {proto}"),
                None => warn!("client handling failed: {e:#}"),
            },
            Err(_) => warn!("client exchange timed out mid-handshake; abandoning"),
        }
    }

    /// One full client exchange: frame, env cache, dispatch.
    async fn handle_client<S>(&self, stream: &mut S) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let info = frame::read_initial(stream).await?;

        let env = match self.env_cache.get(info.env_fingerprint) {
            Some(env) => {
                debug!(fingerprint = info.env_fingerprint, "env cache hit");
                env
            }
            None => {
                stream.write_all(&[ENV_REQUEST]).await?;
                let pairs = frame::read_env(stream).await?;
                debug!(
                    fingerprint = info.env_fingerprint,
                    vars = pairs.len(),
                    "env cache miss; uploaded"
                );
                self.env_cache.insert(info.env_fingerprint, pairs)
            }
        };

        let parsed = ClientArgs::parse(&info.args);

        if parsed.has(SwitchKind::Help) {
            info!(pid = info.pid, "serving help");
            return self.serve_text(stream, HELP_TEXT, 0).await;
        }
        if parsed.has(SwitchKind::Version) {
            info!(pid = info.pid, "serving version");
            return self.serve_text(stream, &version_banner(), 0).await;
        }

        let project = project::resolve(&parsed, &env, Path::new(&info.cwd));

        if parsed.has(SwitchKind::Restart) {
            let killed = self.pool.remove_project(&project).await;
            info!(project = %project.display(), killed, "project workers reset");
            let text = format!("Reset: killed {killed} worker(s) for project\n");
            return self.serve_text(stream, &text, 0).await;
        }

        let worker = self
            .pool
            .acquire(
                &project,
                PoolContext {
                    launcher: &self.launcher,
                    maxclients: self.maxclients,
                    reserve: &self.reserve,
                    ids: &self.ids,
                },
            )
            .await?;

        let spec = SessionSpec {
            tty: info.tty,
            pid: info.pid,
            cwd: info.cwd.clone(),
            env: (*env).clone(),
            switches: parsed.switches,
            program_file: parsed.program_file,
            program_args: parsed.program_args,
        };
        let (stdio, signals) = worker.start_session(spec).await?;
        let reply = frame::encode_socket_paths(&stdio, &signals)?;
        stream.write_all(&reply).await?;
        info!(
            pid = info.pid,
            worker = worker.id,
            project = %project.display(),
            "session dispatched"
        );
        Ok(())
    }

    /// Answer a client-served switch over a freshly minted socket pair.
    async fn serve_text<S>(&self, stream: &mut S, text: &str, code: i32) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let seq = self.reply_seq.fetch_add(1, Ordering::Relaxed);
        let (stdio_path, signals_path) = self.paths.reply_sockets(seq);
        let _ = std::fs::remove_file(&stdio_path);
        let _ = std::fs::remove_file(&signals_path);

        let stdio_listener = UnixListener::bind(&stdio_path)
            .with_context(|| format!("bind {}", stdio_path.display()))?;
        let signals_listener = UnixListener::bind(&signals_path)
            .with_context(|| format!("bind {}", signals_path.display()))?;

        let reply = frame::encode_socket_paths(
            &stdio_path.to_string_lossy(),
            &signals_path.to_string_lossy(),
        )?;
        stream.write_all(&reply).await?;

        let accepted = async {
            let (stdio, _) = stdio_listener.accept().await?;
            let (signals, _) = signals_listener.accept().await?;
            Ok::<_, std::io::Error>((stdio, signals))
        };
        let (mut stdio, mut signals) =
            match tokio::time::timeout(REPLY_ACCEPT_TIMEOUT, accepted).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    let _ = std::fs::remove_file(&stdio_path);
                    let _ = std::fs::remove_file(&signals_path);
                    return Err(e).context("accept reply connection");
                }
                Err(_) => {
                    let _ = std::fs::remove_file(&stdio_path);
                    let _ = std::fs::remove_file(&signals_path);
                    anyhow::bail!("client never connected to the reply sockets");
                }
            };

        // The client unlinks on connect; these are for the timeout path only.
        let _ = std::fs::remove_file(&stdio_path);
        let _ = std::fs::remove_file(&signals_path);

        stdio.write_all(text.as_bytes()).await?;
        stdio.flush().await?;
        drop(stdio);
        signals.write_all(&sigframe::encode_exit(code)).await?;
        signals.flush().await?;
        Ok(())
    }

    // Test and status hooks.

    pub async fn pool_sizes(&self) -> std::collections::HashMap<std::path::PathBuf, usize> {
        self.pool.bucket_sizes().await
    }

    pub async fn contains_project(&self, project: &Path) -> bool {
        self.pool.contains_project(project).await
    }

    pub async fn reserve_filled(&self) -> bool {
        self.reserve.is_filled().await
    }
}

enum ClientStream {
    Unix(UnixStream),
    Tcp(TcpStream),
}

/// Accept one connection. For Unix endpoints the socket file is unlinked
/// after every accept and the listener recreated, so a fresh socket exists
/// before the next accept; clients racing the unlink simply connect to the
/// new one.
async fn accept_once(
    listener: &mut Listener,
    endpoint: &Endpoint,
) -> anyhow::Result<ClientStream> {
    match listener {
        Listener::Unix(unix) => {
            let (stream, _) = unix.accept().await?;
            if let Some(path) = endpoint.unix_path() {
                let _ = std::fs::remove_file(path);
                *unix = UnixListener::bind(path)
                    .with_context(|| format!("re-listen on {}", path.display()))?;
            }
            Ok(ClientStream::Unix(stream))
        }
        Listener::Tcp(tcp) => {
            let (stream, _) = tcp.accept().await?;
            Ok(ClientStream::Tcp(stream))
        }
    }
}

fn spawn_signal_handlers(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();
    });
}

fn version_banner() -> String {
    format!("juliaclient version {} (julia-daemon conductor)\n", env!("CARGO_PKG_VERSION"))
}

const HELP_TEXT: &str = "\n    juliaclient [switches] -- [programfile] [args...]\n\
\n\
Switches (any the runtime itself accepts are forwarded):\n\
\n\
 -v, --version              Display version information\n\
 -h, --help                 Print this message\n\
 --project[={<dir>|@.}]     Set <dir> as the active project\n\
 -e, --eval <expr>          Evaluate <expr>\n\
 -E, --print <expr>         Evaluate <expr> and display the result\n\
 -L, --load <file>          Load <file> into the session\n\
 -i                         Interactive mode; REPL runs with the program\n\
 -q, --quiet                Quiet startup: no banner\n\
 --banner={yes|no|auto*}    Enable or disable the startup banner\n\
 --color={yes|no|auto*}     Enable or disable color text\n\
 --history-file={yes|no*}   Load and save the REPL history file\n\
 --restart                  Kill this project's warm workers and reset\n";
