//! Startup lifecycle and shutdown ordering.
//!
//! Everything shared lives on this struct and is passed by reference;
//! there are no module-level singletons. Startup order matters: recovery
//! of orphaned jobs runs strictly before the worker task exists.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use fovea_blob::BlobStore;
use fovea_db::JobStore;
use fovea_plugins::{builtin, PluginContext, PluginRegistry};
use fovea_protocol::SystemConfig;
use fovea_server::AppState;
use fovea_state::{Heartbeat, ProgressBus};
use fovea_worker::{Worker, WorkerConfig, WorkerHandles};

pub struct Runtime {
    pub config: Arc<SystemConfig>,
    pub store: JobStore,
    pub blobs: BlobStore,
    pub registry: Arc<PluginRegistry>,
    pub bus: Arc<ProgressBus>,
    pub heartbeat: Arc<Heartbeat>,
}

impl Runtime {
    /// Initialize every component: database (with orphan recovery), blob
    /// store, plugin registry, bus and heartbeat.
    pub async fn build(config: SystemConfig) -> Result<Self> {
        let pool = fovea_db::open_file(&config.db_path)
            .await
            .with_context(|| format!("Cannot open job database {}", config.db_path.display()))?;
        let store = JobStore::new(pool);

        // Jobs stuck in running are leftovers of a crash; no worker is
        // live yet, so failing them here cannot race anything.
        let recovered = store
            .fail_orphaned_running("worker crashed before the job finished")
            .await?;
        if recovered > 0 {
            warn!("Recovered {} orphaned running job(s)", recovered);
        }

        let blobs = BlobStore::open(&config.data_root)
            .with_context(|| format!("Cannot open blob store {}", config.data_root.display()))?;

        let ctx = PluginContext {
            search_path: config.plugin_search_path.clone(),
        };
        let registry = Arc::new(PluginRegistry::load_all(builtin::all(), &ctx));

        Ok(Self {
            config: Arc::new(config),
            store,
            blobs,
            registry,
            bus: Arc::new(ProgressBus::new()),
            heartbeat: Arc::new(Heartbeat::new()),
        })
    }

    /// Handler state for the HTTP surface; shares every component with
    /// the worker.
    pub fn app_state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            registry: Arc::clone(&self.registry),
            bus: Arc::clone(&self.bus),
            heartbeat: Arc::clone(&self.heartbeat),
            config: Arc::clone(&self.config),
        }
    }

    /// Start the supervised worker task.
    pub fn spawn_worker(&self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let worker = Worker::new(
            WorkerHandles {
                store: self.store.clone(),
                blobs: self.blobs.clone(),
                registry: Arc::clone(&self.registry),
                bus: Arc::clone(&self.bus),
            },
            Arc::clone(&self.heartbeat),
            WorkerConfig {
                poll_interval: self.config.poll_interval,
            },
            shutdown,
        );
        tokio::spawn(worker.run())
    }

    /// Run the HTTP server with the worker alongside it, until a shutdown
    /// signal arrives. Tears down in order: ingress, worker, plugins.
    pub async fn serve(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker_task = self.spawn_worker(shutdown_rx);
        let app = fovea_server::router(self.app_state());

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("Cannot bind {}", self.config.bind_addr))?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")?;

        // Ingress is down; stop the worker between iterations. An
        // in-flight job finishes first.
        info!("Shutting down worker");
        let _ = shutdown_tx.send(true);
        worker_task.await.context("Worker task panicked")?;

        self.registry.unload_all();
        info!("Shutdown complete");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
