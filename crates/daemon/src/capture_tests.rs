// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn retains_everything_under_capacity() {
    let capture = CaptureBuffer::new(16);
    capture.write(b"hello ");
    capture.write(b"world");
    assert_eq!(capture.tail(), "hello world");
}

#[test]
fn keeps_only_the_tail() {
    let capture = CaptureBuffer::new(4);
    capture.write(b"abcdef");
    assert_eq!(capture.tail(), "cdef");
    capture.write(b"gh");
    assert_eq!(capture.tail(), "efgh");
}

#[test]
fn oversized_single_write() {
    let capture = CaptureBuffer::new(3);
    capture.write(b"0123456789");
    assert_eq!(capture.tail(), "789");
}

#[test]
fn empty_by_default() {
    assert!(CaptureBuffer::default().is_empty());
}
