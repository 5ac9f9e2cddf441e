// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use juliaclient::args::ClientArgs;

use super::*;

fn parse(tokens: &[&str]) -> ClientArgs {
    let argv: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
    ClientArgs::parse(&argv)
}

fn no_env() -> Vec<(String, String)> {
    Vec::new()
}

#[test]
fn explicit_absolute_project() {
    let project = resolve(&parse(&["--project=/p1"]), &no_env(), Path::new("/work"));
    assert_eq!(project, Path::new("/p1"));
}

#[test]
fn last_project_switch_wins() {
    let project = resolve(
        &parse(&["--project=/first", "--project=/second"]),
        &no_env(),
        Path::new("/work"),
    );
    assert_eq!(project, Path::new("/second"));
}

#[test]
fn trailing_slash_stripped() {
    let project = resolve(&parse(&["--project=/p1/"]), &no_env(), Path::new("/work"));
    assert_eq!(project, Path::new("/p1"));
}

#[test]
fn relative_project_resolves_against_cwd() {
    let project = resolve(&parse(&["--project=envs/dev"]), &no_env(), Path::new("/work"));
    assert_eq!(project, Path::new("/work/envs/dev"));
}

#[test]
fn tilde_expansion() {
    let project = resolve(&parse(&["--project=~/proj"]), &no_env(), Path::new("/work"));
    let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_owned());
    assert_eq!(project, Path::new(&home).join("proj"));
}

#[test]
fn env_var_fallback() {
    let env = vec![("JULIA_PROJECT".to_owned(), "/from-env".to_owned())];
    let project = resolve(&parse(&[]), &env, Path::new("/work"));
    assert_eq!(project, Path::new("/from-env"));
}

#[test]
fn switch_beats_env_var() {
    let env = vec![("JULIA_PROJECT".to_owned(), "/from-env".to_owned())];
    let project = resolve(&parse(&["--project=/from-switch"]), &env, Path::new("/work"));
    assert_eq!(project, Path::new("/from-switch"));
}

#[test]
fn default_when_nothing_requested() {
    let project = resolve(&parse(&[]), &no_env(), Path::new("/work"));
    assert!(project.ends_with(".julia/environments/default"));
}

#[test]
fn at_dot_searches_upward() {
    let tree = tempfile::tempdir().unwrap();
    let root = tree.path();
    std::fs::create_dir_all(root.join("a/b")).unwrap();
    std::fs::write(root.join("a/Project.toml"), "name = \"A\"\n").unwrap();

    let project = resolve(&parse(&["--project=@."]), &no_env(), &root.join("a/b"));
    assert_eq!(project, root.join("a"));
}

#[test]
fn empty_value_searches_upward_and_falls_back() {
    let tree = tempfile::tempdir().unwrap();
    // No Project.toml anywhere under the temp root.
    let project = resolve(&parse(&["--project="]), &no_env(), tree.path());
    assert!(project.ends_with(".julia/environments/default"));
}
