// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

#[test]
fn short_forms_canonicalise() {
    let parsed = ClientArgs::parse(&argv(&["-e", "1+1", "-E", "x", "-L", "setup.jl"]));
    let names: Vec<&str> = parsed.switches.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["--eval", "--print", "--load"]);
    assert_eq!(parsed.switches[0].value, "1+1");
    assert_eq!(parsed.switches[2].value, "setup.jl");
    assert!(parsed.program_file.is_none());
}

#[test]
fn equals_form() {
    let parsed = ClientArgs::parse(&argv(&["--project=/p1", "--banner=no"]));
    assert_eq!(parsed.last_value(SwitchKind::Project), Some("/p1"));
    assert_eq!(parsed.last_value(SwitchKind::Banner), Some("no"));
}

#[test]
fn double_dash_terminates_switches() {
    let parsed = ClientArgs::parse(&argv(&["-q", "--", "script.jl", "-e", "ignored"]));
    assert_eq!(parsed.switches.len(), 1);
    assert_eq!(parsed.program_file.as_deref(), Some("script.jl"));
    assert_eq!(parsed.program_args, argv(&["-e", "ignored"]));
}

#[test]
fn bare_token_is_program_file() {
    let parsed = ClientArgs::parse(&argv(&["script.jl", "a", "b"]));
    assert_eq!(parsed.program_file.as_deref(), Some("script.jl"));
    assert_eq!(parsed.program_args, argv(&["a", "b"]));
}

#[test]
fn lone_dash_is_stdin_program() {
    let parsed = ClientArgs::parse(&argv(&["-", "x"]));
    assert_eq!(parsed.program_file.as_deref(), Some("-"));
    assert_eq!(parsed.program_args, argv(&["x"]));
}

#[test]
fn missing_value_yields_empty_string() {
    let parsed = ClientArgs::parse(&argv(&["-e"]));
    assert_eq!(parsed.switches[0].value, "");
}

#[test]
fn last_project_wins() {
    let parsed = ClientArgs::parse(&argv(&["--project=/a", "--project=/b"]));
    assert_eq!(parsed.last_value(SwitchKind::Project), Some("/b"));
}

#[test]
fn double_dash_with_nothing_after() {
    let parsed = ClientArgs::parse(&argv(&["-i", "--"]));
    assert!(parsed.program_file.is_none());
    assert!(parsed.program_args.is_empty());
    assert!(parsed.has(SwitchKind::Interactive));
}

#[test]
fn unknown_switches_preserved() {
    let parsed = ClientArgs::parse(&argv(&["--threads=4", "-O2"]));
    assert_eq!(parsed.switches[0].name, "--threads");
    assert_eq!(parsed.switches[0].value, "4");
    assert_eq!(parsed.switches[1].kind(), SwitchKind::Other);
}
