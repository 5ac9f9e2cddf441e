// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;
use crate::frame;

fn client_info(fp: u64) -> ClientInfo {
    ClientInfo {
        tty: false,
        pid: 7,
        cwd: "/work".to_owned(),
        env_fingerprint: fp,
        env: None,
        args: vec!["-e".to_owned(), "nothing".to_owned()],
    }
}

#[tokio::test]
async fn cache_hit_path() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let server_task = tokio::spawn(async move {
        let info = frame::read_initial(&mut server).await.unwrap();
        assert_eq!(info.env_fingerprint, 11);
        let reply = frame::encode_socket_paths("/run/s.sock", "/run/g.sock").unwrap();
        server.write_all(&reply).await.unwrap();
        server
    });

    let paths = handshake(&mut client, &client_info(11), &[]).await.unwrap();
    assert_eq!(paths.stdio, "/run/s.sock");
    assert_eq!(paths.signals, "/run/g.sock");
    server_task.await.unwrap();
}

#[tokio::test]
async fn cache_miss_uploads_env() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    let env = vec![("TERM".to_owned(), "xterm".to_owned())];

    let server_task = tokio::spawn(async move {
        let _info = frame::read_initial(&mut server).await.unwrap();
        server.write_all(&[frame::ENV_REQUEST]).await.unwrap();
        let uploaded = frame::read_env(&mut server).await.unwrap();
        assert_eq!(uploaded, vec![("TERM".to_owned(), "xterm".to_owned())]);
        let reply = frame::encode_socket_paths("/run/s.sock", "/run/g.sock").unwrap();
        server.write_all(&reply).await.unwrap();
        server
    });

    let paths = handshake(&mut client, &client_info(12), &env).await.unwrap();
    assert_eq!(paths.signals, "/run/g.sock");
    server_task.await.unwrap();
}

#[tokio::test]
async fn server_close_is_truncation() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let server_task = tokio::spawn(async move {
        // Consume the frame, then hang up before replying.
        let mut sink = Vec::new();
        let mut buf = [0u8; 256];
        let n = server.read(&mut buf).await.unwrap();
        sink.extend_from_slice(&buf[..n]);
        drop(server);
    });

    let err = handshake(&mut client, &client_info(13), &[]).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Truncated));
    server_task.await.unwrap();
}
