// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-keyed worker pool.
//!
//! Invariants: a worker appears in at most one bucket; dead workers are
//! purged lazily at lookup; removing a bucket kills its residents. Long-idle
//! dead workers linger until their project is touched again — detection is
//! deliberately lookup-time only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::reserve::ReserveSlot;
use crate::worker::{Worker, WorkerLauncher};

/// Spawn-time context threaded through [`WorkerPool::acquire`].
pub struct PoolContext<'a> {
    pub launcher: &'a WorkerLauncher,
    /// `None` disables the cap: the first worker is reused unconditionally.
    pub maxclients: Option<u32>,
    pub reserve: &'a Arc<ReserveSlot>,
    pub ids: &'a Arc<AtomicU32>,
}

#[derive(Default)]
pub struct WorkerPool {
    buckets: Mutex<HashMap<PathBuf, Vec<Arc<Worker>>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create a worker for `project`.
    pub async fn acquire(
        &self,
        project: &Path,
        ctx: PoolContext<'_>,
    ) -> anyhow::Result<Arc<Worker>> {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(project.to_path_buf()).or_default();
        purge_bucket(bucket).await;

        // Reuse a resident worker with headroom.
        for worker in bucket.iter() {
            match ctx.maxclients {
                None => return Ok(worker.clone()),
                Some(max) => match worker.client_count().await {
                    Ok(count) if count < max => return Ok(worker.clone()),
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(worker = worker.id, "client_count query failed: {e:#}");
                        continue;
                    }
                },
            }
        }

        // Consume the reserve if one is ready; always replenish after.
        if let Some(worker) = ctx.reserve.take().await {
            ReserveSlot::spawn_replenish(
                ctx.reserve.clone(),
                ctx.launcher.clone(),
                ctx.ids.clone(),
            );
            if worker.is_alive().await {
                match worker.bind_project(project).await {
                    Ok(()) => {
                        debug!(worker = worker.id, project = %project.display(), "reserve worker bound");
                        bucket.push(worker.clone());
                        return Ok(worker);
                    }
                    Err(e) => {
                        warn!(worker = worker.id, "binding reserve worker failed: {e:#}");
                        worker.kill().await;
                    }
                }
            } else {
                worker.report_death();
            }
        }

        // No reserve: pay the cold-start cost inline.
        let id = ctx.ids.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::spawn(ctx.launcher, id).await?;
        worker.bind_project(project).await?;
        info!(worker = id, project = %project.display(), "spawned worker");
        bucket.push(worker.clone());
        Ok(worker)
    }

    /// Remove a project's bucket, killing every resident worker.
    /// Returns how many workers were killed.
    pub async fn remove_project(&self, project: &Path) -> usize {
        let workers = self.buckets.lock().await.remove(project).unwrap_or_default();
        let count = workers.len();
        for worker in workers {
            worker.kill().await;
        }
        count
    }

    /// Kill every worker in every bucket.
    pub async fn kill_all(&self) {
        let buckets: Vec<_> = self.buckets.lock().await.drain().collect();
        for (_, workers) in buckets {
            for worker in workers {
                worker.kill().await;
            }
        }
    }

    /// Purge dead workers from a bucket without allocating one.
    /// Returns the number of live residents afterwards.
    pub async fn purge(&self, project: &Path) -> usize {
        let mut buckets = self.buckets.lock().await;
        match buckets.get_mut(project) {
            Some(bucket) => {
                purge_bucket(bucket).await;
                let remaining = bucket.len();
                if remaining == 0 {
                    buckets.remove(project);
                }
                remaining
            }
            None => 0,
        }
    }

    /// Live bucket sizes, for status and tests.
    pub async fn bucket_sizes(&self) -> HashMap<PathBuf, usize> {
        self.buckets
            .lock()
            .await
            .iter()
            .map(|(path, workers)| (path.clone(), workers.len()))
            .collect()
    }

    pub async fn contains_project(&self, project: &Path) -> bool {
        self.buckets.lock().await.contains_key(project)
    }

    #[cfg(test)]
    pub(crate) async fn insert_for_test(&self, project: &Path, worker: Arc<Worker>) {
        self.buckets
            .lock()
            .await
            .entry(project.to_path_buf())
            .or_default()
            .push(worker);
    }
}

async fn purge_bucket(bucket: &mut Vec<Arc<Worker>>) {
    let mut alive = Vec::with_capacity(bucket.len());
    for worker in bucket.drain(..) {
        if worker.is_alive().await {
            alive.push(worker);
        } else {
            worker.report_death();
        }
    }
    *bucket = alive;
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
