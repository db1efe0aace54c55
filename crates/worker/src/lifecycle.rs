//! Install/activate state machine of one worker generation.
//!
//! ```text
//! Uninstalled -> Installing -> Installed (waiting) -> Activating -> Active
//!                      \______________________________________________\__-> Redundant
//! ```
//!
//! Install pre-warms the generation's namespace one asset at a time; a single
//! failed asset never fails the install. Activation evicts every other
//! namespace and claims traffic without waiting for a reload.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gym_sync_core::{CacheStorage, Error, Logger};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;

use crate::config_store::WorkerConfig;
use crate::fetch::{NetRequest, Network};
use crate::strategy::CacheStrategyEngine;

/// Lifecycle state of a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninstalled,
    Installing,
    /// Installed and waiting for skip-waiting.
    Installed,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Outcome of one pre-warm pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

pub struct LifecycleController {
    config: Arc<WorkerConfig>,
    cache: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    engine: CacheStrategyEngine,
    logger: Logger,
    state: watch::Sender<WorkerState>,
    skip_requested: AtomicBool,
    preload_enabled: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        config: Arc<WorkerConfig>, cache: Arc<dyn CacheStorage>, network: Arc<dyn Network>, engine: CacheStrategyEngine,
        logger: Logger,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Uninstalled);
        Self {
            config,
            cache,
            network,
            engine,
            logger,
            state,
            skip_requested: AtomicBool::new(false),
            preload_enabled: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Whether this generation routes traffic (claimed and active).
    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Active
    }

    pub fn navigation_preload_enabled(&self) -> bool {
        self.preload_enabled.load(Ordering::SeqCst)
    }

    /// Install then, if skip-waiting was requested, activate.
    pub async fn run(&self) -> Result<PrecacheReport, Error> {
        let report = self.install().await?;
        if self.skip_requested.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(report)
    }

    /// Open the namespace and pre-warm it.
    ///
    /// # Errors
    ///
    /// Fails if the worker was already installed or the namespace cannot be
    /// opened; the generation is then redundant.
    pub async fn install(&self) -> Result<PrecacheReport, Error> {
        if !self.transition(WorkerState::Uninstalled, WorkerState::Installing) {
            return Err(Error::InvalidInput(format!("cannot install from state {}", self.state())));
        }

        self.skip_requested.store(true, Ordering::SeqCst);
        self.logger.info("installing", Some(&json!({ "namespace": self.config.namespace.as_str() })));

        if let Err(e) = self.cache.open_namespace(&self.config.namespace).await {
            self.logger.error("failed to open cache namespace", Some(&json!({ "error": e.to_string() })));
            self.state.send_replace(WorkerState::Redundant);
            return Err(e);
        }

        let report = self.precache().await;
        self.transition(WorkerState::Installing, WorkerState::Installed);
        Ok(report)
    }

    /// Fetch and store every static asset individually.
    ///
    /// Safe to re-run: entries are overwritten in place.
    pub async fn precache(&self) -> PrecacheReport {
        let mut report = PrecacheReport::default();

        for path in self.config.static_assets().iter() {
            match self.precache_one(path).await {
                Ok(()) => report.cached.push(path.to_string()),
                Err(e) => {
                    self.logger.error("failed to pre-cache asset", Some(&json!({ "path": path, "error": e.to_string() })));
                    report.failed.push(path.to_string());
                }
            }
        }

        self.logger.info(
            "pre-cache complete",
            Some(&json!({ "cached": report.cached.len(), "failed": report.failed.len() })),
        );
        report
    }

    /// Re-run the pre-warm, then drop every entry outside the asset list so
    /// the namespace holds exactly the manifest's asset set.
    ///
    /// An asset that fails to refresh keeps its previous entry.
    pub async fn refresh(&self) -> PrecacheReport {
        let report = self.precache().await;

        let wanted: HashSet<String> = self
            .config
            .static_assets()
            .iter()
            .filter_map(|path| self.config.url_for(path).ok())
            .map(String::from)
            .collect();

        let stored = match self.cache.keys(&self.config.namespace).await {
            Ok(stored) => stored,
            Err(e) => {
                self.logger.error("failed to list cache entries", Some(&json!({ "error": e.to_string() })));
                return report;
            }
        };

        let mut pruned = 0;
        for url in stored.iter().filter(|url| !wanted.contains(*url)) {
            match self.cache.delete_entry(&self.config.namespace, "GET", url).await {
                Ok(_) => pruned += 1,
                Err(e) => self.logger.error(
                    "failed to prune cache entry",
                    Some(&json!({ "url": url, "error": e.to_string() })),
                ),
            }
        }

        self.logger.debug("cache refreshed", Some(&json!({ "pruned": pruned })));
        report
    }

    async fn precache_one(&self, path: &str) -> Result<(), Error> {
        let url = self.config.url_for(path)?;
        let response = self.network.fetch(&NetRequest::get(url.clone())).await?;

        if !self.engine.is_storable(&response) {
            return Err(Error::HttpError(format!("{url} answered {}", response.status.as_u16())));
        }

        self.cache.put_entry(&response.to_entry(&self.config.namespace, &url)).await
    }

    /// Request activation. Activates immediately when installed and waiting.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_requested.store(true, Ordering::SeqCst);

        match self.state() {
            WorkerState::Installed => self.activate().await,
            WorkerState::Active => {
                self.logger.debug("skip waiting on active worker ignored", None);
                Ok(())
            }
            state => {
                self.logger.debug("skip waiting recorded", Some(&json!({ "state": state.to_string() })));
                Ok(())
            }
        }
    }

    /// Evict stale namespaces, enable preload and claim traffic.
    pub async fn activate(&self) -> Result<(), Error> {
        if !self.transition(WorkerState::Installed, WorkerState::Activating) {
            return match self.state() {
                WorkerState::Active | WorkerState::Activating => Ok(()),
                state => Err(Error::InvalidInput(format!("cannot activate from state {state}"))),
            };
        }

        self.evict_stale().await;

        if self.config.navigation_preload {
            self.preload_enabled.store(true, Ordering::SeqCst);
            self.logger.debug("navigation preload enabled", None);
        }

        self.transition(WorkerState::Activating, WorkerState::Active);
        self.logger.info("activated and controlling clients", Some(&json!({ "namespace": self.config.namespace.as_str() })));
        Ok(())
    }

    async fn evict_stale(&self) {
        let namespaces = match self.cache.namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                self.logger.error("failed to list cache namespaces", Some(&json!({ "error": e.to_string() })));
                return;
            }
        };

        for namespace in namespaces.iter().filter(|ns| **ns != self.config.namespace) {
            match self.cache.delete_namespace(namespace).await {
                Ok(_) => self.logger.info("deleted stale cache", Some(&json!({ "namespace": namespace.as_str() }))),
                Err(e) => self.logger.error(
                    "failed to delete stale cache",
                    Some(&json!({ "namespace": namespace.as_str(), "error": e.to_string() })),
                ),
            }
        }
    }

    /// Retire this generation after a newer one took over.
    pub fn mark_redundant(&self) {
        self.state.send_replace(WorkerState::Redundant);
        self.preload_enabled.store(false, Ordering::SeqCst);
        self.logger.info("worker is redundant", None);
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}
