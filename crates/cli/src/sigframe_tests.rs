// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn encode_decode_exit() {
    let mut parser = SignalParser::new();
    let frames = parser.push(&encode_exit(42)).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].name, "exit");
    assert_eq!(frames[0].exit_code(), Some(42));
}

#[test]
fn negative_exit_code() {
    let mut parser = SignalParser::new();
    let frames = parser.push(&encode("exit", "-1")).unwrap();
    assert_eq!(frames[0].exit_code(), Some(-1));
}

#[test]
fn every_split_of_a_multi_frame_stream() {
    // Three well-formed frames; any chunking must yield exactly these three
    // frames in order.
    let mut stream = Vec::new();
    stream.extend_from_slice(&encode("exit", "0"));
    stream.extend_from_slice(&encode("exit", "255"));
    stream.extend_from_slice(&encode("ping", ""));

    for split in 0..=stream.len() {
        let mut parser = SignalParser::new();
        let mut frames = parser.push(&stream[..split]).unwrap();
        frames.extend(parser.push(&stream[split..]).unwrap());
        assert_eq!(frames.len(), 3, "split at {split}");
        assert_eq!(frames[0].data, "0");
        assert_eq!(frames[1].data, "255");
        assert_eq!(frames[2].name, "ping");
    }
}

#[test]
fn byte_at_a_time() {
    let stream = encode("exit", "17");
    let mut parser = SignalParser::new();
    let mut frames = Vec::new();
    for b in stream {
        frames.extend(parser.push(&[b]).unwrap());
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].exit_code(), Some(17));
}

#[test]
fn missing_soh_is_fatal() {
    let mut parser = SignalParser::new();
    assert_eq!(parser.push(b"exit"), Err(SignalError::MissingSoh));
}

#[test]
fn duplicate_stx_is_fatal() {
    let mut parser = SignalParser::new();
    let bytes = [SOH, b'e', STX, b'1', STX, b'2', EOT];
    assert_eq!(parser.push(&bytes), Err(SignalError::DuplicateStx));
}

#[test]
fn eot_without_stx_is_fatal() {
    let mut parser = SignalParser::new();
    let bytes = [SOH, b'e', b'x', EOT];
    assert_eq!(parser.push(&bytes), Err(SignalError::EotWithoutStx));
}

#[test]
fn oversized_frame_is_fatal() {
    let mut parser = SignalParser::new();
    let mut bytes = vec![SOH];
    bytes.extend(std::iter::repeat(b'a').take(2000));
    assert_eq!(parser.push(&bytes), Err(SignalError::Overflow));
}

#[test]
fn burst_larger_than_the_buffer_still_parses() {
    // Completeness matters, not burst size: 300 tiny frames exceed 1 KiB
    // but never leave an oversized remainder behind.
    let mut stream = Vec::new();
    for i in 0..300 {
        stream.extend_from_slice(&encode("exit", &i.to_string()));
    }
    let mut parser = SignalParser::new();
    let frames = parser.push(&stream).unwrap();
    assert_eq!(frames.len(), 300);
    assert_eq!(frames[299].data, "299");
}

#[test]
fn incomplete_frame_is_retained() {
    let mut parser = SignalParser::new();
    assert!(parser.push(&[SOH, b'e']).unwrap().is_empty());
    let frames = parser.push(&[STX, b'3', EOT]).unwrap();
    assert_eq!(frames[0].exit_code(), Some(3));
}
