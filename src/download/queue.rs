//! FIFO download queue: a single worker, dedup on enqueue, and cooperative
//! shutdown (§4.6). Processing runs as an independent task that outlives
//! individual VFS callbacks — mirrors the teacher's `DownloadManager`
//! pattern of a long-lived worker driven off a channel rather than spawning
//! one task per request.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use tokio::sync::{Mutex, Notify};

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, slug: &str);
}

struct Inner {
    queue: Mutex<VecDeque<String>>,
    shutting_down: AtomicBool,
    notify: Notify,
}

/// Cloneable handle to the shared queue state; the worker loop and every
/// caller of `enqueue`/`shutdown` hold one of these.
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<Inner>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                shutting_down: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Non-blocking; a slug already queued keeps its prior position.
    pub async fn enqueue(&self, slug: impl Into<String>) {
        let slug = slug.into();
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        let mut q = self.inner.queue.lock().await;
        if q.iter().any(|s| s == &slug) {
            return;
        }
        info!("enqueued download job for {slug}");
        q.push_back(slug);
        drop(q);
        self.inner.notify.notify_one();
    }

    pub async fn len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Raises `shutting_down`, drains the queue, and returns. The in-flight
    /// job's subprocess cancellation (§4.8) is the runner's responsibility;
    /// the caller should have already invoked it before calling this.
    pub async fn shutdown(&self) {
        info!("download queue shutting down");
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.queue.lock().await.clear();
        self.inner.notify.notify_one();
    }

    fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    async fn pop_front(&self) -> Option<String> {
        self.inner.queue.lock().await.pop_front()
    }

    /// Drives the worker loop: pick the head, run the job, pause ~1s (skipped
    /// once shutdown has started), repeat. Spawn once at startup; it runs
    /// until the process exits.
    pub fn spawn_worker(self, runner: Arc<dyn JobRunner>) {
        tokio::spawn(async move {
            loop {
                if self.is_shutting_down() {
                    self.inner.notify.notified().await;
                    if self.is_shutting_down() {
                        continue;
                    }
                }

                let Some(slug) = self.pop_front().await else {
                    self.inner.notify.notified().await;
                    continue;
                };

                runner.run(&slug).await;

                if !self.is_shutting_down() {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
    }
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}
