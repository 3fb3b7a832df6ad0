//! Relay Builder API
//!
//! Wires a rules engine, the room store, the connection hub and the reaper into
//! a running relay. Consumers (the server binary, integration tests) get back a
//! [`RelayHandle`] to register connections and shut the relay down.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gambit_core::{
    GambitResult, RelayConfig, RoomStore, RulesEngine, SystemTimeSource, TimeSource,
};

use crate::reaper::ReaperTask;
use crate::relay::SessionRelay;
use crate::transport::ConnectionHub;

// ----------------------------------------------------------------------------
// Relay Builder
// ----------------------------------------------------------------------------

/// Builder for a relay instance
pub struct RelayBuilder {
    rules: Arc<dyn RulesEngine>,
    config: RelayConfig,
    time_source: Arc<dyn TimeSource>,
    enable_reaper: bool,
}

impl RelayBuilder {
    /// Create a builder around the rules engine the relay will consult
    pub fn new(rules: Arc<dyn RulesEngine>) -> Self {
        Self {
            rules,
            config: RelayConfig::default(),
            time_source: Arc::new(SystemTimeSource),
            enable_reaper: true,
        }
    }

    /// Set the relay configuration
    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock used for room timestamps and expiry
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Enable/disable the background reaper
    pub fn reaper(mut self, enabled: bool) -> Self {
        self.enable_reaper = enabled;
        self
    }

    /// Validate the configuration and start the relay
    ///
    /// Must be called from within a tokio runtime when the reaper is enabled.
    pub fn start(self) -> GambitResult<RelayHandle> {
        self.config.validate()?;

        let store = Arc::new(RoomStore::new(self.rules, self.time_source));
        let hub = Arc::new(ConnectionHub::new());
        let relay = Arc::new(SessionRelay::new(
            Arc::clone(&store),
            hub.clone(),
            self.config.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper_handle = if self.enable_reaper {
            let reaper = ReaperTask::new(
                Arc::clone(&store),
                hub.clone(),
                &self.config.rooms,
                &self.config.reaper,
            );
            Some(tokio::spawn(reaper.run(shutdown_rx)))
        } else {
            None
        };

        info!(
            validation = ?self.config.moves.validation,
            reaper = self.enable_reaper,
            "Gambit relay started"
        );

        Ok(RelayHandle {
            relay,
            hub,
            store,
            shutdown_tx,
            reaper_handle,
        })
    }
}

// ----------------------------------------------------------------------------
// Relay Handle
// ----------------------------------------------------------------------------

/// Handle to a running relay
pub struct RelayHandle {
    relay: Arc<SessionRelay>,
    hub: Arc<ConnectionHub>,
    store: Arc<RoomStore>,
    shutdown_tx: watch::Sender<bool>,
    reaper_handle: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn relay(&self) -> Arc<SessionRelay> {
        Arc::clone(&self.relay)
    }

    pub fn hub(&self) -> Arc<ConnectionHub> {
        Arc::clone(&self.hub)
    }

    pub fn store(&self) -> Arc<RoomStore> {
        Arc::clone(&self.store)
    }

    /// Whether the reaper is still sweeping
    pub fn is_running(&self) -> bool {
        self.reaper_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the reaper and wait for it to finish
    pub async fn shutdown(&mut self) {
        info!("Relay shutdown requested");
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.reaper_handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Reaper task ended abnormally");
            }
        }
        info!(live_rooms = self.store.len(), "Relay stopped");
    }
}
