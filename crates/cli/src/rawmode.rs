// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client terminal handling.
//!
//! While a session runs, line editing belongs to the worker, so the local
//! terminal must hand over bytes as typed: `ICANON` and `ECHO` go off and
//! nothing else changes. In particular `ISIG` stays on — Ctrl-C must keep
//! raising SIGINT locally so the multiplexer can relay it to the worker as
//! a `0x03` byte instead of the terminal swallowing it.
//!
//! Putting the attributes back is required on *every* exit path, panics
//! included. Drop order alone cannot promise that: an unwind may abort, and
//! the default panic report is unreadable on a half-raw terminal anyway. So
//! the saved attributes are also parked in a process-wide slot that a panic
//! hook drains before the report prints; the slot is emptied again when the
//! guard restores normally, making hook and guard mutually exclusive.

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::sync::{Mutex, Once};

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

/// Attributes the panic hook should restore, or `None` while the terminal
/// is already in its original state.
static SAVED_FOR_PANIC: Mutex<Option<(RawFd, nix::libc::termios)>> = Mutex::new(None);

/// The hook chains onto whatever hook exists; install it at most once.
static HOOK: Once = Once::new();

/// Puts stdin into byte-at-a-time mode; restores it when dropped.
pub struct RawModeGuard {
    fd: RawFd,
    original: Termios,
}

impl RawModeGuard {
    /// Clear `ICANON` and `ECHO` on stdin and arm the panic-time restore.
    pub fn enter() -> anyhow::Result<Self> {
        let fd = std::io::stdin().as_raw_fd();
        let original = termios::tcgetattr(stdin_fd(fd))?;
        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        termios::tcsetattr(stdin_fd(fd), SetArg::TCSAFLUSH, &raw)?;

        if let Ok(mut slot) = SAVED_FOR_PANIC.lock() {
            *slot = Some((fd, original.clone().into()));
        }
        HOOK.call_once(install_panic_restore);

        Ok(Self { fd, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Disarm the hook before restoring, so a panic after this point
        // cannot restore a second time.
        if let Ok(mut slot) = SAVED_FOR_PANIC.lock() {
            slot.take();
        }
        let _ = termios::tcsetattr(stdin_fd(self.fd), SetArg::TCSAFLUSH, &self.original);
    }
}

/// Chain a hook that resets the terminal ahead of the default panic output.
fn install_panic_restore() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Ok(mut slot) = SAVED_FOR_PANIC.lock() {
            if let Some((fd, saved)) = slot.take() {
                // SAFETY: a plain tcsetattr(2) on stdin with attributes
                // captured earlier; no allocation, no unwinding.
                unsafe {
                    nix::libc::tcsetattr(fd, nix::libc::TCSAFLUSH, &saved);
                }
            }
        }
        previous(info);
    }));
}

fn stdin_fd(fd: RawFd) -> BorrowedFd<'static> {
    // SAFETY: callers only ever pass stdin's fd, and stdin stays open for
    // the life of the process.
    unsafe { BorrowedFd::borrow_raw(fd) }
}

/// Whether stdin is a terminal.
pub fn stdin_is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}
