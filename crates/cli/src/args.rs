// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime switch model.
//!
//! The client forwards its argv verbatim; the conductor parses it here to
//! decide dispatch, project resolution, and per-session behavior. This is a
//! hand parser rather than clap because every token — recognised or not —
//! must survive the round trip to the worker untouched.

use serde::{Deserialize, Serialize};

/// One parsed switch: canonical name plus its value (empty when absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub name: String,
    pub value: String,
}

impl Switch {
    pub fn kind(&self) -> SwitchKind {
        SwitchKind::from_name(&self.name)
    }
}

/// Recognised switch names, for dispatch matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Eval,
    Print,
    Load,
    Interactive,
    Quiet,
    Banner,
    Color,
    HistoryFile,
    Project,
    Help,
    Version,
    Restart,
    Other,
}

impl SwitchKind {
    fn from_name(name: &str) -> Self {
        match name {
            "--eval" => Self::Eval,
            "--print" => Self::Print,
            "--load" => Self::Load,
            "-i" => Self::Interactive,
            "-q" | "--quiet" => Self::Quiet,
            "--banner" => Self::Banner,
            "--color" => Self::Color,
            "--history-file" => Self::HistoryFile,
            "--project" => Self::Project,
            "-h" | "--help" => Self::Help,
            "-v" | "--version" => Self::Version,
            "--restart" => Self::Restart,
            _ => Self::Other,
        }
    }
}

/// Switches that consume a value from the next token when no `=` form is used.
fn takes_next_token(name: &str) -> bool {
    matches!(name, "--eval" | "--print" | "--load" | "--project")
}

/// Canonicalise the short spellings that have long equivalents.
fn canonical(name: &str) -> &str {
    match name {
        "-e" => "--eval",
        "-E" => "--print",
        "-L" => "--load",
        other => other,
    }
}

/// A fully parsed client argv.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientArgs {
    /// Switches in source order.
    pub switches: Vec<Switch>,
    /// Program file, if any. `"-"` means "read program text from stdin".
    pub program_file: Option<String>,
    /// Arguments belonging to the program itself.
    pub program_args: Vec<String>,
}

impl ClientArgs {
    /// Parse an argv (without the binary name).
    ///
    /// `--` terminates switch parsing; the next token becomes the program
    /// file and the remainder its args. The first non-switch token does the
    /// same without consuming a separator.
    pub fn parse(args: &[String]) -> Self {
        let mut switches = Vec::new();
        let mut program_file = None;
        let mut program_args = Vec::new();
        let mut it = args.iter();

        while let Some(tok) = it.next() {
            if tok == "--" {
                program_file = it.next().cloned();
                program_args.extend(it.cloned());
                break;
            }
            if !tok.starts_with('-') || tok == "-" {
                program_file = Some(tok.clone());
                program_args.extend(it.cloned());
                break;
            }
            let (name, value) = match tok.split_once('=') {
                Some((n, v)) => (canonical(n).to_owned(), v.to_owned()),
                None => {
                    let name = canonical(tok).to_owned();
                    let value = if takes_next_token(&name) {
                        it.next().cloned().unwrap_or_default()
                    } else {
                        String::new()
                    };
                    (name, value)
                }
            };
            switches.push(Switch { name, value });
        }

        Self { switches, program_file, program_args }
    }

    /// Whether any switch of the given kind is present.
    pub fn has(&self, kind: SwitchKind) -> bool {
        self.switches.iter().any(|s| s.kind() == kind)
    }

    /// Value of the last switch of the given kind, if present.
    pub fn last_value(&self, kind: SwitchKind) -> Option<&str> {
        self.switches
            .iter()
            .rev()
            .find(|s| s.kind() == kind)
            .map(|s| s.value.as_str())
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
