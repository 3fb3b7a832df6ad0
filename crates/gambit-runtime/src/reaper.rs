//! Reaper Task
//!
//! Periodically evicts rooms older than the configured TTL. The scan reads
//! creation times from the store's index without taking room locks; each
//! expired room is then locked and deleted on its own.

use core::time::Duration;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use gambit_core::{ReaperConfig, RoomConfig, RoomId, RoomStore, ServerEvent, Timestamp};

use crate::transport::Transport;

// ----------------------------------------------------------------------------
// Reaper Task
// ----------------------------------------------------------------------------

/// Background sweep over the room store
pub struct ReaperTask {
    store: Arc<RoomStore>,
    transport: Arc<dyn Transport>,
    ttl: Duration,
    interval: Duration,
    notify_members: bool,
}

impl ReaperTask {
    pub fn new(
        store: Arc<RoomStore>,
        transport: Arc<dyn Transport>,
        rooms: &RoomConfig,
        reaper: &ReaperConfig,
    ) -> Self {
        Self {
            store,
            transport,
            ttl: rooms.ttl(),
            interval: reaper.interval(),
            notify_members: reaper.notify_members,
        }
    }

    /// Evict every room that is older than the TTL at `now`
    pub async fn sweep_once(&self, now: Timestamp) -> Vec<RoomId> {
        let evicted = if self.notify_members {
            self.sweep_with_notice(now).await
        } else {
            self.store.sweep_expired(self.ttl, now).await
        };

        for room_id in &evicted {
            self.transport.drop_group(room_id);
        }

        if evicted.is_empty() {
            debug!(live_rooms = self.store.len(), "Reaper sweep found nothing to evict");
        } else {
            info!(
                evicted = evicted.len(),
                live_rooms = self.store.len(),
                "Reaper evicted expired rooms"
            );
        }
        evicted
    }

    async fn sweep_with_notice(&self, now: Timestamp) -> Vec<RoomId> {
        let mut evicted = Vec::new();
        for room_id in self.store.expired(self.ttl, now) {
            let Ok(mut guard) = self.store.lock(&room_id).await else {
                continue;
            };
            if !guard.room().is_expired(self.ttl, now) {
                continue;
            }
            self.transport.broadcast(
                &room_id,
                &ServerEvent::RoomExpired {
                    room_id: room_id.clone(),
                },
                None,
            );
            guard.delete();
            evicted.push(room_id);
        }
        evicted
    }

    /// Sweep on every interval tick until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Reaper task starting"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once(self.store.now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reaper task stopped");
    }
}
