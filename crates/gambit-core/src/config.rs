//! Relay configuration
//!
//! Settings consumed by the room store, the session relay and the reaper. The
//! server binary embeds [`RelayConfig`] under its `relay` section and layers it
//! with figment; everything here is plain serde data with defaults.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{GambitError, GambitResult};

/// One hour, the default room lifetime and sweep period
pub const DEFAULT_ROOM_TTL_SECS: u64 = 60 * 60;

// ----------------------------------------------------------------------------
// Room Configuration
// ----------------------------------------------------------------------------

/// Room lifetime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Age in seconds past which a room is evicted
    pub ttl_secs: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_ROOM_TTL_SECS,
        }
    }
}

impl RoomConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ----------------------------------------------------------------------------
// Reaper Configuration
// ----------------------------------------------------------------------------

/// Background eviction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// Send `roomExpired` to connected members before evicting a room
    pub notify_members: bool,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_ROOM_TTL_SECS,
            notify_members: false,
        }
    }
}

impl ReaperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ----------------------------------------------------------------------------
// Move Configuration
// ----------------------------------------------------------------------------

/// How far the relay trusts a client's computed position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveValidation {
    /// Re-validate every move and store the engine's result
    #[default]
    Authoritative,
    /// Store the client-supplied position as is; turn order is still checked
    TrustClient,
}

/// Move handling settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    pub validation: MoveValidation,
}

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub rooms: RoomConfig,
    pub reaper: ReaperConfig,
    pub moves: MoveConfig,
}

impl RelayConfig {
    /// Short lifetimes for tests that drive the reaper in real time
    pub fn testing() -> Self {
        Self {
            rooms: RoomConfig { ttl_secs: 1 },
            reaper: ReaperConfig {
                interval_secs: 1,
                notify_members: true,
            },
            moves: MoveConfig::default(),
        }
    }

    /// Check the configuration for values the relay cannot run with
    pub fn validate(&self) -> GambitResult<()> {
        if self.rooms.ttl_secs == 0 {
            return Err(GambitError::config_error(
                "Room TTL must be greater than 0",
            ));
        }
        if self.reaper.interval_secs == 0 {
            return Err(GambitError::config_error(
                "Reaper interval must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
