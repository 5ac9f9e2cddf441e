// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;
use juliaclient::endpoint::{self, Endpoint};

/// Warm-worker conductor daemon for the Julia runtime.
#[derive(Debug, Clone, Parser)]
#[command(name = "juliad", version, about)]
pub struct Config {
    /// Endpoint to listen on: a socket path, `:PORT`, `IPv4:PORT` or
    /// `[IPv6]:PORT`. Defaults to the per-user runtime socket.
    #[arg(long, env = "JULIA_DAEMON_SERVER")]
    pub server: Option<String>,

    /// Max concurrent sessions per worker (0 = unlimited, workers are
    /// reused unconditionally).
    #[arg(long, env = "JULIA_DAEMON_WORKER_MAXCLIENTS", default_value_t = 1)]
    pub worker_maxclients: u32,

    /// Extra arguments appended to the worker command line,
    /// whitespace-split.
    #[arg(long, env = "JULIA_DAEMON_WORKER_ARGS", default_value = "--startup-file=no")]
    pub worker_args: String,

    /// Worker binary.
    #[arg(long, env = "JULIA_DAEMON_WORKER_EXECUTABLE", default_value = "juliad-worker")]
    pub worker_executable: String,

    /// Idle seconds before a worker exits on its own (0 = disabled).
    #[arg(long, env = "JULIA_DAEMON_WORKER_TTL", default_value_t = 7200)]
    pub worker_ttl: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "JULIA_DAEMON_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text or json).
    #[arg(long, env = "JULIA_DAEMON_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl Config {
    /// The endpoint to bind, honouring `JULIA_DAEMON_SERVER` defaults.
    pub fn endpoint(&self) -> anyhow::Result<Endpoint> {
        match &self.server {
            Some(spec) if !spec.is_empty() => endpoint::parse(spec),
            _ => Ok(Endpoint::Unix(endpoint::default_socket_path())),
        }
    }

    /// Worker argv tail from the whitespace-split args setting.
    pub fn worker_argv(&self) -> Vec<String> {
        self.worker_args.split_whitespace().map(str::to_owned).collect()
    }

    /// Session cap per worker; `None` means uncapped.
    pub fn maxclients(&self) -> Option<u32> {
        (self.worker_maxclients > 0).then_some(self.worker_maxclients)
    }

    /// Worker idle TTL; `None` disables the check.
    pub fn ttl(&self) -> Option<Duration> {
        (self.worker_ttl > 0).then(|| Duration::from_secs(self.worker_ttl))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
