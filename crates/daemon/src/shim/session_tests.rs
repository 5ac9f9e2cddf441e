// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use juliaclient::args::ClientArgs;
use juliaclient::sigframe::SignalParser;

use crate::control::SessionSpec;
use crate::shim::sandbox::BuiltinRuntime;

use super::*;

struct SessionEnds {
    stdio: UnixStream,
    signals: UnixStream,
    handle: std::thread::JoinHandle<()>,
}

/// Run a session on a background thread against socket pairs.
fn start(argv: &[&str], tty: bool) -> SessionEnds {
    let tokens: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    let parsed = ClientArgs::parse(&tokens);
    let spec = SessionSpec {
        tty,
        pid: std::process::id(),
        cwd: std::env::temp_dir().to_string_lossy().into_owned(),
        env: vec![],
        switches: parsed.switches,
        program_file: parsed.program_file,
        program_args: parsed.program_args,
    };
    let (stdio_near, stdio_far) = UnixStream::pair().unwrap();
    let (signals_near, signals_far) = UnixStream::pair().unwrap();
    let handle = std::thread::spawn(move || {
        run_blocking(&BuiltinRuntime::new(), &spec, None, stdio_far, signals_far)
    });
    SessionEnds { stdio: stdio_near, signals: signals_near, handle }
}

fn read_exit_code(signals: &mut UnixStream) -> i64 {
    let mut parser = SignalParser::new();
    let mut buf = [0u8; 256];
    loop {
        let n = signals.read(&mut buf).unwrap();
        assert_ne!(n, 0, "signals socket closed without an exit frame");
        let frames = parser.push(&buf[..n]).unwrap();
        if let Some(frame) = frames.iter().find(|f| f.name == "exit") {
            return frame.exit_code().unwrap();
        }
    }
}

fn read_stdio(stdio: UnixStream) -> String {
    let mut text = String::new();
    let mut stdio = stdio;
    stdio.read_to_string(&mut text).unwrap();
    text
}

#[test]
fn eval_nothing_exits_zero() {
    let mut ends = start(&["-e", "nothing"], false);
    assert_eq!(read_exit_code(&mut ends.signals), 0);
    assert_eq!(read_stdio(ends.stdio), "");
    ends.handle.join().unwrap();
}

#[test]
fn exit_code_passes_through() {
    for code in [1i64, 42, 255] {
        let mut ends = start(&["-e", &format!("exit({code})")], false);
        assert_eq!(read_exit_code(&mut ends.signals), code);
        ends.handle.join().unwrap();
    }
}

#[test]
fn print_appends_newline() {
    let mut ends = start(&["-E", "17"], false);
    assert_eq!(read_exit_code(&mut ends.signals), 0);
    assert_eq!(read_stdio(ends.stdio), "17\n");
    ends.handle.join().unwrap();
}

#[test]
fn switches_execute_in_source_order() {
    let mut ends = start(&["-E", "1", "-E", "2", "-e", "exit(9)", "-E", "3"], false);
    assert_eq!(read_exit_code(&mut ends.signals), 9);
    // Only the output before exit() is visible.
    assert_eq!(read_stdio(ends.stdio), "1\n2\n");
    ends.handle.join().unwrap();
}

#[test]
fn user_error_reports_and_exits_one() {
    let mut ends = start(&["-e", "using Pkg"], false);
    assert_eq!(read_exit_code(&mut ends.signals), 1);
    let output = read_stdio(ends.stdio);
    assert!(output.starts_with("ERROR:"), "unexpected output {output:?}");
    ends.handle.join().unwrap();
}

#[test]
fn program_from_stdin() {
    let mut ends = start(&["-"], false);
    ends.stdio.write_all(b"exit(5)").unwrap();
    ends.stdio.shutdown(std::net::Shutdown::Write).unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 5);
    ends.handle.join().unwrap();
}

#[test]
fn no_work_enters_repl_until_eof() {
    let mut ends = start(&[], false);
    // Non-tty, so no banner; closing our write side ends the REPL cleanly.
    ends.stdio.shutdown(std::net::Shutdown::Write).unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 0);
    let output = read_stdio(ends.stdio);
    assert!(output.contains("julia> "), "expected a prompt, got {output:?}");
    ends.handle.join().unwrap();
}

#[test]
fn load_alone_still_enters_repl() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "nothing\n").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let mut ends = start(&["-L", &path], false);
    ends.stdio.shutdown(std::net::Shutdown::Write).unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 0);
    ends.handle.join().unwrap();
}

#[test]
fn interactive_flag_forces_repl_after_eval() {
    let mut ends = start(&["-e", "nothing", "-i"], false);
    ends.stdio.write_all(b"exit(3)\n").unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 3);
    ends.handle.join().unwrap();
}

#[test]
fn repl_survives_user_errors() {
    let mut ends = start(&[], false);
    ends.stdio.write_all(b"using Pkg\nexit(4)\n").unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 4);
    let output = read_stdio(ends.stdio);
    assert!(output.contains("ERROR:"), "error should be shown, got {output:?}");
    ends.handle.join().unwrap();
}

#[test]
fn banner_respects_switches() {
    // tty + default banner → banner shown.
    let mut ends = start(&["--banner=yes"], false);
    ends.stdio.shutdown(std::net::Shutdown::Write).unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 0);
    assert!(read_stdio(ends.stdio).contains("juliad worker"));
    ends.handle.join().unwrap();

    // --quiet suppresses the default banner even on a tty.
    let mut ends = start(&["-q"], true);
    ends.stdio.shutdown(std::net::Shutdown::Write).unwrap();
    assert_eq!(read_exit_code(&mut ends.signals), 0);
    assert!(!read_stdio(ends.stdio).contains("juliad worker"));
    ends.handle.join().unwrap();
}
