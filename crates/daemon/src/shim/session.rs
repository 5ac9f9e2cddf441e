// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One client session, start to exit frame.
//!
//! Runs on a blocking task. Switches execute in source order, then the
//! program file, then — when nothing asked for work or `-i` insists — the
//! REPL. Whatever happens, the session ends by framing an exit code onto
//! the signals socket.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::{debug, warn};

use juliaclient::args::{Switch, SwitchKind};
use juliaclient::sigframe;

use crate::control::SessionSpec;
use crate::shim::replio::{self, SessionIo};
use crate::shim::sandbox::{ContextSpec, EvalError, ReplOptions, Runtime};

/// Run the session body and signal its exit code.
pub fn run_blocking(
    runtime: &dyn Runtime,
    spec: &SessionSpec,
    project: Option<String>,
    stdio: UnixStream,
    mut signals: UnixStream,
) {
    let color = replio::color_enabled(&spec.switches, &spec.env);
    let mut io = match SessionIo::new(stdio, color) {
        Ok(io) => io,
        Err(e) => {
            warn!("session stdio setup failed: {e}");
            let _ = signals.write_all(&sigframe::encode_exit(1));
            return;
        }
    };

    let exit_code = match body(runtime, spec, project, &mut io) {
        Ok(()) => 0,
        Err(EvalError::Exit(code)) => code,
        Err(EvalError::Failure(message)) => {
            let _ = writeln!(io, "{message}");
            1
        }
    };

    let _ = io.flush();
    drop(io);
    if let Err(e) = signals.write_all(&sigframe::encode_exit(exit_code)) {
        debug!("exit frame write failed (client already gone): {e}");
    }
}

fn body(
    runtime: &dyn Runtime,
    spec: &SessionSpec,
    project: Option<String>,
    io: &mut SessionIo,
) -> Result<(), EvalError> {
    // Environment overrides are scoped to the session; restored on return.
    let _env_guard = EnvOverride::apply(&spec.env);
    std::env::set_current_dir(&spec.cwd).map_err(|e| {
        EvalError::Failure(format!("ERROR: cannot change directory to {}: {e}", spec.cwd))
    })?;

    let context_spec = ContextSpec {
        cwd: spec.cwd.clone().into(),
        args: spec.program_args.clone(),
        project,
    };
    let mut ctx = runtime
        .create_context(&context_spec)
        .map_err(|e| EvalError::Failure(format!("ERROR: session setup failed: {e:#}")))?;

    let mut did_work = false;
    for switch in &spec.switches {
        match switch.kind() {
            SwitchKind::Eval => {
                ctx.eval(&switch.value, io)?;
                did_work = true;
            }
            SwitchKind::Print => {
                let shown = ctx.eval_show(&switch.value, io)?;
                let _ = writeln!(io, "{shown}");
                did_work = true;
            }
            SwitchKind::Load => {
                ctx.include(Path::new(&switch.value), io)?;
            }
            _ => {}
        }
    }

    if let Some(file) = &spec.program_file {
        did_work = true;
        if file == "-" {
            let text = io
                .read_to_end_string()
                .map_err(|e| EvalError::Failure(format!("ERROR: reading program text: {e}")))?;
            ctx.eval(&text, io)?;
        } else {
            ctx.include(Path::new(file), io)?;
        }
    }

    let interactive = spec.switches.iter().any(|s| s.kind() == SwitchKind::Interactive);
    if !did_work || interactive {
        let opts = repl_options(&spec.switches, spec.tty);
        ctx.repl(io, &opts)?;
    }

    Ok(())
}

/// Banner/quiet/history resolution for the REPL.
fn repl_options(switches: &[Switch], tty: bool) -> ReplOptions {
    let quiet = switches.iter().any(|s| s.kind() == SwitchKind::Quiet);
    let banner = match last_value(switches, SwitchKind::Banner) {
        Some("yes") => true,
        Some("no") => false,
        _ => !quiet && tty,
    };
    let history = !matches!(last_value(switches, SwitchKind::HistoryFile), Some("no"));
    ReplOptions { banner, quiet, history }
}

fn last_value(switches: &[Switch], kind: SwitchKind) -> Option<&str> {
    switches.iter().rev().find(|s| s.kind() == kind).map(|s| s.value.as_str())
}

/// Applies the client's environment and restores the previous values on
/// drop. Sessions at the default one-per-worker cap never overlap; with a
/// raised cap the last writer wins for the overlap window.
struct EnvOverride {
    saved: Vec<(String, Option<String>)>,
}

impl EnvOverride {
    fn apply(pairs: &[(String, String)]) -> Self {
        let mut saved = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            saved.push((key.clone(), std::env::var(key).ok()));
            std::env::set_var(key, value);
        }
        Self { saved }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            match previous {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
