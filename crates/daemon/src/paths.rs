// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout of the daemon-owned runtime directory.
//!
//! All transient sockets live here: the conductor endpoint, per-worker
//! control sockets, canned-reply socket pairs, and (one level down, owned by
//! each worker process) the per-session stdio/signals sockets.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use juliaclient::endpoint::{default_runtime_dir, Endpoint};

/// Environment variable the conductor sets so workers place their session
/// sockets under the same runtime directory.
pub const RUNTIME_DIR_ENV: &str = "JULIA_DAEMON_RUNTIME_DIR";

/// Resolved runtime paths for one daemon instance.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    dir: PathBuf,
}

impl RuntimePaths {
    /// Derive the runtime directory from the endpoint: a Unix socket's parent
    /// directory, or the default per-user directory for TCP endpoints.
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        let dir = match endpoint.unix_path().and_then(Path::parent) {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => default_runtime_dir(),
        };
        Self { dir }
    }

    /// The runtime directory inherited from the conductor, for worker
    /// processes; falls back to the per-user default.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(RUNTIME_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_runtime_dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the runtime directory with owner-only permissions.
    /// A failure here is fatal for the daemon.
    pub fn ensure(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create runtime dir {}", self.dir.display()))?;
        fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
            .with_context(|| format!("chmod runtime dir {}", self.dir.display()))?;
        Ok(())
    }

    /// Control socket the conductor listens on for worker `id`.
    pub fn control_socket(&self, id: u32) -> PathBuf {
        self.dir.join(format!("worker-{id}.ctl.sock"))
    }

    /// Socket pair for a conductor-served canned reply.
    pub fn reply_sockets(&self, seq: u32) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("reply-{seq}.stdio.sock")),
            self.dir.join(format!("reply-{seq}.signals.sock")),
        )
    }

    /// Directory for one worker process's session sockets.
    pub fn worker_session_dir(&self, pid: u32) -> PathBuf {
        self.dir.join(format!("worker-{pid}"))
    }

    /// Whether the given socket path lives inside this runtime directory.
    pub fn owns(&self, socket: &Path) -> bool {
        socket.starts_with(&self.dir)
    }
}
