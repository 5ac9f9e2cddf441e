// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `juliaclient` — impersonates the language runtime and hands the real work
//! to a warm worker behind the conductor. Every argument is forwarded
//! verbatim; even `--help` is answered by the daemon.

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    std::process::exit(juliaclient::run::run(args).await);
}
