// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The evaluation seam between the shim and the embedded language runtime.
//!
//! Each client session gets its own [`EvalContext`] — an isolated namespace
//! with a session-local exit channel. `exit(n)` in user code surfaces as
//! [`EvalError::Exit`] and unwinds only the session, never the worker.
//!
//! The shipped [`BuiltinRuntime`] evaluates just the control-plane subset
//! the conductor relies on (`nothing`, `exit(n)`, plain literals); real user
//! code requires linking an embedded runtime behind [`Runtime`].

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::shim::replio::SessionIo;

/// How a session body can fail.
#[derive(Debug)]
pub enum EvalError {
    /// User code requested exit with this code; unwinds the session only.
    Exit(i32),
    /// Anything else, already rendered for the client's stdio.
    Failure(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit(code) => write!(f, "exit({code})"),
            Self::Failure(message) => f.write_str(message),
        }
    }
}

/// Per-session context parameters.
#[derive(Debug, Clone)]
pub struct ContextSpec {
    pub cwd: PathBuf,
    /// The program's own arguments, bound as a sequence in the namespace.
    pub args: Vec<String>,
    /// Project the owning worker is bound to, if any.
    pub project: Option<String>,
}

/// Knobs the REPL would otherwise read from a terminal.
#[derive(Debug, Clone, Copy)]
pub struct ReplOptions {
    pub banner: bool,
    pub quiet: bool,
    pub history: bool,
}

/// One client's isolated namespace.
pub trait EvalContext: Send {
    /// Evaluate an expression for effect.
    fn eval(&mut self, code: &str, io: &mut SessionIo) -> Result<(), EvalError>;

    /// Evaluate an expression and return its display form (for `--print`).
    fn eval_show(&mut self, code: &str, io: &mut SessionIo) -> Result<String, EvalError>;

    /// Include a source file into this namespace (for `--load`).
    fn include(&mut self, path: &Path, io: &mut SessionIo) -> Result<(), EvalError>;

    /// Run the interactive REPL until EOF or exit.
    fn repl(&mut self, io: &mut SessionIo, opts: &ReplOptions) -> Result<(), EvalError>;
}

/// Process-wide runtime handle: creates per-session contexts and answers
/// top-scope evaluations on the control connection.
pub trait Runtime: Send + Sync {
    fn create_context(&self, spec: &ContextSpec) -> anyhow::Result<Box<dyn EvalContext>>;
    fn top_eval(&self, expr: &str) -> anyhow::Result<String>;
}

// ---------------------------------------------------------------------------
// Built-in minimal evaluator
// ---------------------------------------------------------------------------

/// Values of the built-in expression subset.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Nothing,
    Int(i64),
    Str(String),
}

impl Value {
    fn show(&self) -> String {
        match self {
            Self::Nothing => "nothing".to_owned(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => format!("{s:?}"),
        }
    }
}

/// Runtime used when no language runtime is embedded.
#[derive(Debug, Default)]
pub struct BuiltinRuntime;

impl BuiltinRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Runtime for BuiltinRuntime {
    fn create_context(&self, spec: &ContextSpec) -> anyhow::Result<Box<dyn EvalContext>> {
        Ok(Box::new(BuiltinContext { _spec: spec.clone() }))
    }

    fn top_eval(&self, expr: &str) -> anyhow::Result<String> {
        match eval_subset(expr) {
            Ok(value) => Ok(value.show()),
            Err(EvalError::Exit(_)) => anyhow::bail!("exit is not valid in the top scope"),
            Err(EvalError::Failure(message)) => anyhow::bail!("{message}"),
        }
    }
}

struct BuiltinContext {
    _spec: ContextSpec,
}

impl EvalContext for BuiltinContext {
    fn eval(&mut self, code: &str, _io: &mut SessionIo) -> Result<(), EvalError> {
        eval_subset(code).map(|_| ())
    }

    fn eval_show(&mut self, code: &str, _io: &mut SessionIo) -> Result<String, EvalError> {
        eval_subset(code).map(|value| value.show())
    }

    fn include(&mut self, path: &Path, _io: &mut SessionIo) -> Result<(), EvalError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EvalError::Failure(format!("could not load {}: {e}", path.display())))?;
        eval_subset(text.trim()).map(|_| ())
    }

    fn repl(&mut self, io: &mut SessionIo, opts: &ReplOptions) -> Result<(), EvalError> {
        if opts.banner {
            let _ = writeln!(
                io,
                "juliad worker {} (built-in evaluator; no language runtime embedded)",
                env!("CARGO_PKG_VERSION")
            );
        }
        loop {
            let _ = write!(io, "julia> ");
            let _ = io.flush();
            let Some(line) = io
                .read_line()
                .map_err(|e| EvalError::Failure(format!("input read failed: {e}")))?
            else {
                return Ok(());
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match eval_subset(line) {
                Ok(Value::Nothing) => {}
                Ok(value) => {
                    let _ = writeln!(io, "{}", value.show());
                }
                Err(EvalError::Exit(code)) => return Err(EvalError::Exit(code)),
                // The REPL survives user errors.
                Err(EvalError::Failure(message)) => {
                    let _ = writeln!(io, "ERROR: {message}");
                }
            }
        }
    }
}

/// Evaluate the built-in expression subset.
fn eval_subset(code: &str) -> Result<Value, EvalError> {
    let code = code.trim();
    if code.is_empty() || code == "nothing" {
        return Ok(Value::Nothing);
    }
    if let Some(inner) = code.strip_prefix("exit(").and_then(|s| s.strip_suffix(')')) {
        let inner = inner.trim();
        let code = if inner.is_empty() {
            0
        } else {
            inner.parse().map_err(|_| {
                EvalError::Failure(format!("ERROR: exit code must be an integer, got {inner:?}"))
            })?
        };
        return Err(EvalError::Exit(code));
    }
    if let Ok(n) = code.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    if code.len() >= 2 && code.starts_with('"') && code.ends_with('"') {
        return Ok(Value::Str(code[1..code.len() - 1].to_owned()));
    }
    Err(EvalError::Failure(format!(
        "ERROR: cannot evaluate {code:?}: this worker has no language runtime embedded"
    )))
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
