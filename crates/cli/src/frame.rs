// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Initial handshake frame and its little-endian wire codec.
//!
//! Layout (client → conductor):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0  | 4 | magic `0x4A444301` |
//! | 4  | 1 | flags (bit 0 = tty) |
//! | 5  | 3 | reserved, zero |
//! | 8  | 4 | pid |
//! | 12 | 2+L | cwd (u16 length + UTF-8 bytes) |
//! | …  | 8 | env fingerprint |
//! | …  | 2 | arg count, then u16-length-prefixed args |
//!
//! On a cache miss the conductor answers with a single [`ENV_REQUEST`] byte
//! and the client uploads its environment as a u16 pair count followed by
//! length-prefixed key/value strings. The socket-paths reply is two
//! length-prefixed strings.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const MAGIC: u32 = 0x4A44_4301;
pub const FLAG_TTY: u8 = 0b0000_0001;

/// Byte the conductor sends when it needs the full environment.
pub const ENV_REQUEST: u8 = 0x3F;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),
    #[error("truncated frame")]
    Truncated,
    #[error("invalid UTF-8 in {0}")]
    Utf8(&'static str),
    #[error("{0} too long for a u16 length prefix")]
    FieldTooLong(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn eof(err: std::io::Error) -> ProtocolError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::Truncated
    } else {
        ProtocolError::Io(err)
    }
}

/// Everything the conductor learns about a client from the initial frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub tty: bool,
    pub pid: u32,
    pub cwd: String,
    pub env_fingerprint: u64,
    /// Resolved lazily: from the conductor's cache on a hit, or uploaded by
    /// the client on a miss.
    pub env: Option<Vec<(String, String)>>,
    pub args: Vec<String>,
}

fn put_str16(out: &mut Vec<u8>, field: &'static str, s: &str) -> Result<(), ProtocolError> {
    let len: u16 = s.len().try_into().map_err(|_| ProtocolError::FieldTooLong(field))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Encode the initial frame.
pub fn encode_initial(info: &ClientInfo) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(64 + info.cwd.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.push(if info.tty { FLAG_TTY } else { 0 });
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&info.pid.to_le_bytes());
    put_str16(&mut out, "cwd", &info.cwd)?;
    out.extend_from_slice(&info.env_fingerprint.to_le_bytes());
    let count: u16 = info
        .args
        .len()
        .try_into()
        .map_err(|_| ProtocolError::FieldTooLong("arg list"))?;
    out.extend_from_slice(&count.to_le_bytes());
    for arg in &info.args {
        put_str16(&mut out, "arg", arg)?;
    }
    Ok(out)
}

async fn read_u16<R: AsyncRead + Unpin>(r: &mut R) -> Result<u16, ProtocolError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf).await.map_err(eof)?;
    Ok(u16::from_le_bytes(buf))
}

async fn read_bytes<R: AsyncRead + Unpin>(r: &mut R, len: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await.map_err(eof)?;
    Ok(buf)
}

async fn read_str16<R: AsyncRead + Unpin>(
    r: &mut R,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let len = read_u16(r).await?;
    let bytes = read_bytes(r, len as usize).await?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::Utf8(field))
}

/// Read a length-prefixed string whose low length byte was already consumed.
///
/// The client reads one byte to distinguish [`ENV_REQUEST`] from the start
/// of the socket-paths reply; when it is not the request byte it is the low
/// byte of the first path's length.
pub async fn read_str16_after<R: AsyncRead + Unpin>(
    r: &mut R,
    low_byte: u8,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let mut high = [0u8; 1];
    r.read_exact(&mut high).await.map_err(eof)?;
    let len = u16::from_le_bytes([low_byte, high[0]]);
    let bytes = read_bytes(r, len as usize).await?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::Utf8(field))
}

/// Decode the initial frame (conductor side).
pub async fn read_initial<R: AsyncRead + Unpin>(r: &mut R) -> Result<ClientInfo, ProtocolError> {
    let mut head = [0u8; 12];
    r.read_exact(&mut head).await.map_err(eof)?;
    let magic = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }
    let tty = head[4] & FLAG_TTY != 0;
    let pid = u32::from_le_bytes([head[8], head[9], head[10], head[11]]);

    let cwd = read_str16(r, "cwd").await?;

    let mut fp = [0u8; 8];
    r.read_exact(&mut fp).await.map_err(eof)?;
    let env_fingerprint = u64::from_le_bytes(fp);

    let count = read_u16(r).await?;
    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        args.push(read_str16(r, "arg").await?);
    }

    Ok(ClientInfo { tty, pid, cwd, env_fingerprint, env: None, args })
}

/// Encode the env upload block (client side, after [`ENV_REQUEST`]).
pub fn encode_env(pairs: &[(String, String)]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    let count: u16 = pairs
        .len()
        .try_into()
        .map_err(|_| ProtocolError::FieldTooLong("env list"))?;
    out.extend_from_slice(&count.to_le_bytes());
    for (key, value) in pairs {
        put_str16(&mut out, "env key", key)?;
        put_str16(&mut out, "env value", value)?;
    }
    Ok(out)
}

/// Decode the env upload block (conductor side).
pub async fn read_env<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<Vec<(String, String)>, ProtocolError> {
    let count = read_u16(r).await?;
    let mut pairs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = read_str16(r, "env key").await?;
        let value = read_str16(r, "env value").await?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

/// Encode the socket-paths reply (conductor side).
pub fn encode_socket_paths(stdio: &str, signals: &str) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    put_str16(&mut out, "stdio path", stdio)?;
    put_str16(&mut out, "signals path", signals)?;
    Ok(out)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
