// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conductor endpoint resolution.
//!
//! `$JULIA_DAEMON_SERVER` selects the endpoint; unset, it defaults to
//! `${XDG_RUNTIME_DIR}/julia-daemon/conductor.sock` with the usual
//! `/run/user/<uid>` fallback. Besides filesystem paths the daemon accepts
//! `:PORT` (localhost TCP), `IPv4:PORT` and `[IPv6]:PORT` forms.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;

pub const SERVER_ENV: &str = "JULIA_DAEMON_SERVER";

/// Where the conductor listens (and the client connects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl Endpoint {
    /// The socket file backing this endpoint, for Unix endpoints.
    pub fn unix_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Unix(path) => Some(path),
            Self::Tcp(_) => None,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "{addr}"),
        }
    }
}

/// The per-user runtime directory owned by the daemon.
pub fn default_runtime_dir() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("/run/user/{}", nix::unistd::getuid())));
    base.join("julia-daemon")
}

/// Default Unix socket path.
pub fn default_socket_path() -> PathBuf {
    default_runtime_dir().join("conductor.sock")
}

/// Parse an endpoint spec into its concrete form.
pub fn parse(spec: &str) -> anyhow::Result<Endpoint> {
    if let Some(port) = spec.strip_prefix(':') {
        let port: u16 = port.parse().with_context(|| format!("bad port in {spec:?}"))?;
        return Ok(Endpoint::Tcp(SocketAddr::from(([127, 0, 0, 1], port))));
    }
    if spec.starts_with('[') {
        let addr: SocketAddr =
            spec.parse().with_context(|| format!("bad [IPv6]:PORT endpoint {spec:?}"))?;
        return Ok(Endpoint::Tcp(addr));
    }
    if let Some((host, port)) = spec.rsplit_once(':') {
        if let (Ok(ip), Ok(port)) = (host.parse::<IpAddr>(), port.parse::<u16>()) {
            return Ok(Endpoint::Tcp(SocketAddr::new(ip, port)));
        }
    }
    Ok(Endpoint::Unix(PathBuf::from(spec)))
}

/// Resolve the endpoint from the environment, falling back to the default.
pub fn resolve() -> anyhow::Result<Endpoint> {
    match std::env::var(SERVER_ENV) {
        Ok(spec) if !spec.is_empty() => parse(&spec),
        _ => Ok(Endpoint::Unix(default_socket_path())),
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
