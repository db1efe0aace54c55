//! Ownership of the active worker generation and update checks.

use std::sync::{Arc, Weak};

use gym_sync_core::{AppConfig, CacheNamespace, CacheStorage, ConfigError, Error, NamespaceInfo};
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::config_store::{ConfigStore, WorkerConfig};
use crate::control::PlatformCommand;
use crate::fetch::Network;
use crate::worker::ServiceWorker;

/// Result of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Unchanged,
    Updated { from: CacheNamespace, to: CacheNamespace },
}

pub struct Registration {
    app: AppConfig,
    cache: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    active: RwLock<Arc<ServiceWorker>>,
    platform_tx: mpsc::UnboundedSender<PlatformCommand>,
    update_lock: Mutex<()>,
}

impl Registration {
    /// Resolve the configuration, bring the first generation to active and
    /// start listening for platform commands.
    ///
    /// # Errors
    ///
    /// Only an unusable application config is an error. A failed install
    /// leaves the generation uncontrolling, so traffic goes straight to the
    /// network.
    pub async fn register(
        app: AppConfig, cache: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
    ) -> Result<Arc<Self>, ConfigError> {
        let mut config = ConfigStore::initialize(&app, network.as_ref()).await?;
        if config.degraded {
            config = adopt_existing(config, cache.as_ref()).await;
        }
        let (platform_tx, platform_rx) = mpsc::unbounded_channel();

        let worker = Arc::new(ServiceWorker::new(config, cache.clone(), network.clone(), platform_tx.clone()));
        if let Err(e) = worker.start().await {
            tracing::error!(error = %e, namespace = %worker.config().namespace, "initial worker failed to start");
        }

        let registration = Arc::new(Self {
            app,
            cache,
            network,
            active: RwLock::new(worker),
            platform_tx,
            update_lock: Mutex::new(()),
        });

        tokio::spawn(command_loop(Arc::downgrade(&registration), platform_rx));
        Ok(registration)
    }

    /// The generation currently answering requests.
    pub async fn active(&self) -> Arc<ServiceWorker> {
        self.active.read().await.clone()
    }

    /// Every namespace present in the store, with entry counts and sizes.
    pub async fn namespaces(&self) -> Result<Vec<NamespaceInfo>, Error> {
        self.cache.namespace_info().await
    }

    /// Re-read the manifest and swap in a new generation if its namespace changed.
    ///
    /// Checks are serialized. A degraded config (manifest unreachable) never
    /// triggers an update, so a transient outage cannot evict the live cache.
    pub async fn check_for_updates(&self) -> UpdateOutcome {
        let _guard = self.update_lock.lock().await;
        let current = self.active().await;

        let config = match ConfigStore::initialize(&self.app, self.network.as_ref()).await {
            Ok(config) if config.degraded => {
                tracing::info!("manifest unavailable, keeping current worker");
                return UpdateOutcome::Unchanged;
            }
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "update check failed");
                return UpdateOutcome::Unchanged;
            }
        };

        if config.namespace == current.config().namespace {
            tracing::debug!(namespace = %config.namespace, "worker is up to date");
            return UpdateOutcome::Unchanged;
        }

        let from = current.config().namespace.clone();
        let to = config.namespace.clone();
        tracing::info!(%from, %to, "new version found, installing");

        let next = Arc::new(ServiceWorker::new(config, self.cache.clone(), self.network.clone(), self.platform_tx.clone()));
        if let Err(e) = next.start().await {
            tracing::error!(error = %e, namespace = %to, "new worker failed to start");
            next.lifecycle().mark_redundant();
            return UpdateOutcome::Unchanged;
        }

        let previous = std::mem::replace(&mut *self.active.write().await, next);
        previous.lifecycle().mark_redundant();

        UpdateOutcome::Updated { from, to }
    }
}

/// Keep the newest namespace a previous run left behind instead of
/// activating the default one, which would evict it.
async fn adopt_existing(mut config: WorkerConfig, cache: &dyn CacheStorage) -> WorkerConfig {
    let namespaces = match cache.namespaces().await {
        Ok(namespaces) => namespaces,
        Err(e) => {
            tracing::error!(error = %e, "failed to list cache namespaces");
            return config;
        }
    };

    let newest = namespaces
        .iter()
        .rev()
        .find_map(|ns| ns.version_tag(&config.cache_prefix).map(|tag| (ns.clone(), tag.to_string())));

    if let Some((namespace, tag)) = newest {
        tracing::info!(%namespace, "manifest unavailable, keeping cached namespace");
        config.namespace = namespace;
        config.version = tag;
    }
    config
}

async fn command_loop(registration: Weak<Registration>, mut commands: mpsc::UnboundedReceiver<PlatformCommand>) {
    while let Some(command) = commands.recv().await {
        let Some(registration) = registration.upgrade() else {
            break;
        };

        match command {
            PlatformCommand::CheckForUpdates => {
                registration.check_for_updates().await;
            }
        }
    }

    tracing::debug!("platform command loop stopped");
}
