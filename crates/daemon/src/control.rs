// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conductor ↔ worker control plane.
//!
//! One JSON object per line over the worker's control socket. The conductor
//! is the only writer of requests and every request/reply exchange happens
//! under the per-worker mutex, so replies never interleave.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use juliaclient::args::Switch;

/// Everything the worker needs to run one client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    pub tty: bool,
    pub pid: u32,
    pub cwd: String,
    /// Fully resolved client environment (cache hit or upload).
    pub env: Vec<(String, String)>,
    /// Switches in source order, already canonicalised.
    pub switches: Vec<Switch>,
    /// `"-"` means "read program text from stdin".
    pub program_file: Option<String>,
    /// The program's own arguments.
    pub program_args: Vec<String>,
}

/// Conductor → worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Start a client session; the worker answers with two `socket` replies.
    Client { spec: SessionSpec },
    /// Evaluate an expression in the worker's top scope.
    Eval { expr: String },
    /// Exit now if idle, otherwise once the last session ends.
    SoftExit,
}

/// Worker → conductor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ControlReply {
    /// A freshly created session socket path.
    Socket { path: String },
    /// Result of an `eval`, serialised as a string.
    Result { value: String },
    /// The request failed; the worker stays up.
    Error { message: String },
}

/// Write one message as a JSON line.
pub async fn write_line<W, T>(writer: &mut W, message: &T) -> anyhow::Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Read one message from a JSON line. `Ok(None)` means the peer hung up.
pub async fn read_line<R, T>(reader: &mut R) -> anyhow::Result<Option<T>>
where
    R: AsyncBufReadExt + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_str(raw)?));
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
