//! Owns the handles the reference kept as module-level globals: the
//! catalog client, the config, the download queue, and the process
//! supervisor (§9's "module-level globals -> owned handles" note).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::download::{DownloadJobRunner, DownloadQueue, ProcessSupervisor};

pub struct App {
    pub config: Arc<Config>,
    pub catalog: Arc<dyn Catalog>,
    pub queue: DownloadQueue,
    pub supervisor: Arc<ProcessSupervisor>,
}

impl App {
    pub fn new(config: Arc<Config>, catalog: Arc<dyn Catalog>) -> Result<Self> {
        config
            .validate_disjoint_roots()
            .context("mount point and download root must be disjoint")?;
        std::fs::create_dir_all(config.download_root()).context("creating download root")?;

        let queue = DownloadQueue::new();
        let supervisor = Arc::new(ProcessSupervisor::new());
        let runner = Arc::new(DownloadJobRunner::new(catalog.clone(), config.clone(), supervisor.clone()));
        queue.clone().spawn_worker(runner);

        Ok(Self {
            config,
            catalog,
            queue,
            supervisor,
        })
    }

    /// Auto-enqueues every slug listed in `downloads.txt`, per the `mount`
    /// subcommand's contract (§6).
    pub async fn enqueue_configured_downloads(&self) -> Result<()> {
        for slug in self.config.read_downloads()? {
            self.queue.enqueue(slug).await;
        }
        Ok(())
    }

    /// §5's cooperative shutdown: raise the flag, drain the queue, terminate
    /// any in-flight subprocess, then wait briefly for child cleanup.
    pub async fn shutdown(&self) {
        info!("shutting down");
        self.supervisor.cancel().await;
        self.queue.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
