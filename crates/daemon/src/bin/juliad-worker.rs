// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `juliad-worker` — the worker shim binary.
//!
//! Spawned by the conductor with the control socket path in
//! `JULIA_DAEMON_CONTROL_SOCKET`. Command-line arguments are runtime
//! switches destined for the embedded language runtime; the shim itself
//! ignores them.

use std::sync::Arc;
use std::time::Duration;

use tracing::error;
use tracing_subscriber::EnvFilter;

use juliad::shim;
use juliad::shim::sandbox::BuiltinRuntime;
use juliad::worker::CONTROL_SOCKET_ENV;

fn init_tracing() {
    let level = std::env::var("JULIA_DAEMON_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn ttl_from_env() -> Option<Duration> {
    let secs: u64 = std::env::var("JULIA_DAEMON_WORKER_TTL")
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(7200);
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[tokio::main]
async fn main() {
    init_tracing();

    let Some(control_path) = std::env::var_os(CONTROL_SOCKET_ENV) else {
        eprintln!("juliad-worker: {CONTROL_SOCKET_ENV} is not set; this binary is spawned by juliad");
        std::process::exit(2);
    };

    let runtime = Arc::new(BuiltinRuntime::new());
    if let Err(e) = shim::run(runtime, control_path.into(), ttl_from_env()).await {
        error!("worker shim failed: {e:#}");
        std::process::exit(1);
    }
}
