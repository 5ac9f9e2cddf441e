// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the conductor handshake.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::frame::{self, ClientInfo, ProtocolError, ENV_REQUEST};

/// The two session socket paths returned by the conductor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPaths {
    pub stdio: String,
    pub signals: String,
}

/// Send the initial frame and complete the env-cache exchange.
///
/// On a cache miss the conductor answers with a single `0x3F` byte and the
/// full environment is uploaded before the socket paths arrive; on a hit the
/// first byte is already the low byte of the stdio path's length prefix.
pub async fn handshake<S>(
    stream: &mut S,
    info: &ClientInfo,
    env: &[(String, String)],
) -> Result<SocketPaths, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let initial = frame::encode_initial(info)?;
    stream.write_all(&initial).await?;
    stream.flush().await?;

    let mut first = [0u8; 1];
    stream.read_exact(&mut first).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(e)
        }
    })?;

    let stdio = if first[0] == ENV_REQUEST {
        let block = frame::encode_env(env)?;
        stream.write_all(&block).await?;
        stream.flush().await?;
        read_str16(stream, "stdio path").await?
    } else {
        frame::read_str16_after(stream, first[0], "stdio path").await?
    };
    let signals = read_str16(stream, "signals path").await?;

    Ok(SocketPaths { stdio, signals })
}

async fn read_str16<S: AsyncRead + Unpin>(
    stream: &mut S,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let mut first = [0u8; 1];
    stream.read_exact(&mut first).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(e)
        }
    })?;
    frame::read_str16_after(stream, first[0], field).await
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
