//! Page-to-worker control messages.

use std::sync::Arc;

use gym_sync_core::Logger;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::LifecycleController;

/// Messages a controlled page may post, tagged by `type`.
///
/// Anything unrecognized, including malformed payloads, is [`Unknown`](ControlMessage::Unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    CheckForUpdates,
    RefreshCache,
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Decode a posted payload. Never fails.
    pub fn parse(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or(Self::Unknown)
    }
}

/// Requests the worker cannot satisfy itself and forwards to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCommand {
    CheckForUpdates,
}

/// Dispatches control messages to their effects.
#[derive(Clone)]
pub struct ControlChannel {
    lifecycle: Arc<LifecycleController>,
    platform: mpsc::UnboundedSender<PlatformCommand>,
    logger: Logger,
}

impl ControlChannel {
    pub fn new(
        lifecycle: Arc<LifecycleController>, platform: mpsc::UnboundedSender<PlatformCommand>, logger: Logger,
    ) -> Self {
        Self { lifecycle, platform, logger }
    }

    /// Start the effect of `message` and return without waiting for it.
    ///
    /// The returned handle, when present, completes once the effect has run.
    pub fn handle(&self, message: ControlMessage) -> Option<JoinHandle<()>> {
        self.logger.debug("control message received", Some(&json!({ "message": format!("{message:?}") })));

        match message {
            ControlMessage::SkipWaiting => {
                let lifecycle = self.lifecycle.clone();
                let logger = self.logger.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = lifecycle.skip_waiting().await {
                        logger.error("skip waiting failed", Some(&json!({ "error": e.to_string() })));
                    }
                }))
            }
            ControlMessage::CheckForUpdates => {
                if self.platform.send(PlatformCommand::CheckForUpdates).is_err() {
                    self.logger.error("update check requested but registration is gone", None);
                }
                None
            }
            ControlMessage::RefreshCache => {
                let lifecycle = self.lifecycle.clone();
                Some(tokio::spawn(async move {
                    lifecycle.refresh().await;
                }))
            }
            ControlMessage::Unknown => {
                self.logger.info("ignoring unknown control message", None);
                None
            }
        }
    }
}
