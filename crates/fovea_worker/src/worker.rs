//! The claim-once worker loop.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{error, info, warn};

use fovea_blob::BlobStore;
use fovea_db::JobStore;
use fovea_plugins::PluginRegistry;
use fovea_protocol::defaults::POLL_JITTER_MS;
use fovea_protocol::JobEvent;
use fovea_state::{Heartbeat, ProgressBus};

use crate::executor::execute_job;

/// Worker configuration (plain data).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
}

/// Shared components the worker drives jobs through.
#[derive(Clone)]
pub struct WorkerHandles {
    pub store: JobStore,
    pub blobs: BlobStore,
    pub registry: Arc<PluginRegistry>,
    pub bus: Arc<ProgressBus>,
}

/// The background worker. One instance runs per process, started by the
/// orchestrator and stopped through the shutdown channel.
pub struct Worker {
    handles: WorkerHandles,
    heartbeat: Arc<Heartbeat>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        handles: WorkerHandles,
        heartbeat: Arc<Heartbeat>,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handles,
            heartbeat,
            config,
            shutdown,
        }
    }

    /// Main loop. Exits only between iterations: an in-flight job always
    /// reaches a terminal state before the loop observes shutdown.
    pub async fn run(mut self) {
        info!("Worker entering poll loop");

        loop {
            self.heartbeat.beat();

            if *self.shutdown.borrow() {
                break;
            }

            let job = match self.handles.store.claim_oldest_pending().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    self.idle_sleep().await;
                    continue;
                }
                Err(e) => {
                    error!("Claim query failed: {}", e);
                    self.idle_sleep().await;
                    continue;
                }
            };

            let job_id = job.job_id;
            self.handles.bus.publish(job_id, JobEvent::running(None));

            if let Err(e) = execute_job(&self.handles, &job).await {
                let message = e.to_string();
                warn!("Job {} failed: {}", job_id, message);
                if let Err(finalize_err) =
                    self.handles.store.finalize_failure(job_id, &message).await
                {
                    error!("Could not finalize job {}: {}", job_id, finalize_err);
                }
                self.handles.bus.publish(job_id, JobEvent::failed(message));
            }
        }

        info!("Worker stopped");
    }

    /// Empty-queue sleep, jittered so restarts do not phase-lock, woken
    /// early by shutdown.
    async fn idle_sleep(&mut self) {
        let jitter_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64 % POLL_JITTER_MS)
            .unwrap_or(0);
        let sleep = self.config.poll_interval + Duration::from_millis(jitter_ms);

        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
