// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pre-warmed reserve worker.
//!
//! At most one unassigned worker is held ready so that the first client of a
//! new project skips the cold start. Warm-up runs one synthetic `-e nothing`
//! client end to end, forcing the worker to compile its client-dispatch path
//! before any real user touches it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tracing::{info, warn};

use juliaclient::args::Switch;
use juliaclient::sigframe::SignalParser;

use crate::control::SessionSpec;
use crate::worker::{Worker, WorkerLauncher};

/// How long warm-up may take before the worker is considered broken.
const WARMUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct ReserveSlot {
    slot: tokio::sync::Mutex<Option<Arc<Worker>>>,
}

impl ReserveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detach the reserve worker, if one is ready.
    pub async fn take(&self) -> Option<Arc<Worker>> {
        self.slot.lock().await.take()
    }

    /// Whether a reserve worker is currently held.
    pub async fn is_filled(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Kill the held reserve worker, if any.
    pub async fn kill(&self) {
        if let Some(worker) = self.slot.lock().await.take() {
            worker.kill().await;
        }
    }

    /// Spawn, warm up, and store a new reserve worker.
    pub async fn create(
        &self,
        launcher: &WorkerLauncher,
        ids: &Arc<AtomicU32>,
    ) -> anyhow::Result<()> {
        let id = ids.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::spawn(launcher, id).await.context("spawn reserve worker")?;

        if let Err(e) = tokio::time::timeout(WARMUP_TIMEOUT, warm_up(&worker))
            .await
            .map_err(|_| anyhow::anyhow!("warm-up timed out"))
            .and_then(|r| r)
        {
            worker.kill().await;
            return Err(e).context("warm up reserve worker");
        }

        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            // Someone else already refilled the slot; keep the invariant.
            drop(slot);
            worker.kill().await;
            return Ok(());
        }
        info!(worker = id, "reserve worker ready");
        *slot = Some(worker);
        Ok(())
    }

    /// Replace a consumed reserve in the background.
    pub fn spawn_replenish(self: Arc<Self>, launcher: WorkerLauncher, ids: Arc<AtomicU32>) {
        tokio::spawn(async move {
            if let Err(e) = self.create(&launcher, &ids).await {
                warn!("reserve worker creation failed: {e:#}");
            }
        });
    }
}

/// Run one synthetic no-op client through the worker and wait for its exit
/// frame.
async fn warm_up(worker: &Worker) -> anyhow::Result<()> {
    let spec = SessionSpec {
        tty: false,
        pid: std::process::id(),
        cwd: "/".to_owned(),
        env: Vec::new(),
        switches: vec![Switch { name: "--eval".to_owned(), value: "nothing".to_owned() }],
        program_file: None,
        program_args: Vec::new(),
    };
    let (stdio_path, signals_path) = worker.start_session(spec).await?;

    let stdio = UnixStream::connect(&stdio_path)
        .await
        .with_context(|| format!("connect warm-up stdio {stdio_path}"))?;
    let mut signals = UnixStream::connect(&signals_path)
        .await
        .with_context(|| format!("connect warm-up signals {signals_path}"))?;
    let _ = std::fs::remove_file(&stdio_path);
    let _ = std::fs::remove_file(&signals_path);

    let mut parser = SignalParser::new();
    let mut buf = [0u8; 256];
    loop {
        let n = signals.read(&mut buf).await.context("warm-up signals read")?;
        if n == 0 {
            anyhow::bail!("worker closed warm-up signals socket without an exit frame");
        }
        let frames = parser
            .push(&buf[..n])
            .map_err(|e| anyhow::anyhow!("warm-up signal frame: {e}"))?;
        if frames.iter().any(|f| f.name == "exit") {
            break;
        }
    }
    drop(stdio);
    Ok(())
}
