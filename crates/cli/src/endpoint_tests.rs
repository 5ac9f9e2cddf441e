// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn bare_port_is_localhost_tcp() {
    let ep = parse(":9501").unwrap();
    assert_eq!(ep, Endpoint::Tcp("127.0.0.1:9501".parse().unwrap()));
}

#[test]
fn ipv4_with_port() {
    let ep = parse("10.0.0.7:9501").unwrap();
    assert_eq!(ep, Endpoint::Tcp("10.0.0.7:9501".parse().unwrap()));
}

#[test]
fn ipv6_with_port() {
    let ep = parse("[::1]:9501").unwrap();
    assert_eq!(ep, Endpoint::Tcp("[::1]:9501".parse().unwrap()));
}

#[test]
fn plain_path_is_unix() {
    let ep = parse("/tmp/conductor.sock").unwrap();
    assert_eq!(ep, Endpoint::Unix(PathBuf::from("/tmp/conductor.sock")));
}

#[test]
fn path_with_colon_stays_unix() {
    // A path containing a colon that is not host:port should not become TCP.
    let ep = parse("/tmp/odd:name/conductor.sock").unwrap();
    assert!(matches!(ep, Endpoint::Unix(_)));
}

#[test]
fn bad_port_is_an_error() {
    assert!(parse(":notaport").is_err());
}

#[test]
fn default_path_under_runtime_dir() {
    let path = default_socket_path();
    assert!(path.ends_with("julia-daemon/conductor.sock"));
}
