// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-path resolution — the worker-pool key.
//!
//! Precedence: the last `--project` switch, then `JULIA_PROJECT` from the
//! client's environment, then the default user project. The values `"@."`
//! and `""` mean "search upward from the client's cwd for a `Project.toml`",
//! stopping at the filesystem root and falling back to the default user
//! project. Anything else resolves relative to the client's cwd with `~`
//! expansion and a trailing slash stripped.

use std::path::{Path, PathBuf};

use juliaclient::args::{ClientArgs, SwitchKind};

/// Resolve the project for one client.
pub fn resolve(args: &ClientArgs, env: &[(String, String)], cwd: &Path) -> PathBuf {
    let requested = args
        .last_value(SwitchKind::Project)
        .map(str::to_owned)
        .or_else(|| env_lookup(env, "JULIA_PROJECT"));

    match requested.as_deref() {
        None => default_user_project(),
        Some("") | Some("@.") => search_upward(cwd).unwrap_or_else(default_user_project),
        Some(value) => normalise(value, cwd),
    }
}

/// The host's default user project.
pub fn default_user_project() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
        .join(".julia/environments/default")
}

fn env_lookup(env: &[(String, String)], key: &str) -> Option<String> {
    env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

/// Walk from `cwd` to the filesystem root looking for a `Project.toml`.
fn search_upward(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| dir.join("Project.toml").is_file())
        .map(Path::to_path_buf)
}

fn normalise(value: &str, cwd: &Path) -> PathBuf {
    let expanded = expand_user(value);
    let trimmed = strip_trailing_slash(&expanded);
    let path = Path::new(trimmed.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn expand_user(value: &str) -> String {
    if value == "~" {
        return home().to_string_lossy().into_owned();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home().join(rest).to_string_lossy().into_owned();
    }
    value.to_owned()
}

fn strip_trailing_slash(value: &str) -> std::borrow::Cow<'_, str> {
    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() {
        // "/" (or "///") is the root, not an empty path.
        std::borrow::Cow::Borrowed("/")
    } else {
        std::borrow::Cow::Borrowed(trimmed)
    }
}

fn home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
